//! Process-wide application state: resolved configuration and the two
//! pre-built HTTP clients. Nothing here is mutated by request handling.

use std::time::Duration;

use crate::config::Config;

pub struct AppState {
    pub config: Config,
    pub obstacle_client: reqwest::Client,
    pub router_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let obstacle_client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.obstacle_timeout_s))
            .build()
            .expect("failed to build obstacle service client");
        let router_client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.router_timeout_s))
            .build()
            .expect("failed to build router client");

        Self {
            config,
            obstacle_client,
            router_client,
        }
    }
}
