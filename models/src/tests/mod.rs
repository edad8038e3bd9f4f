mod server_status;
