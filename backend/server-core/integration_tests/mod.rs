#![cfg(unix)]

mod bootstrap;
mod rcon;
mod support;
mod supervisor;
