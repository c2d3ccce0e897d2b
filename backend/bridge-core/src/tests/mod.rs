mod bridge;
mod paths;
mod protocol;
