mod error_location;
