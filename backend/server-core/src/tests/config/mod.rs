mod manager_config;
mod settings;
