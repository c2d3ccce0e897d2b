//! Integration tests exercising the RPC stack end to end over real TCP.

mod rpc_tests;
