mod command;
mod log_stream;
