#![cfg(unix)]

mod commands;
