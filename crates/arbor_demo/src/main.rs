//! Arbor Demo
//!
//! Mounts a todo list on the in-memory host, drives a few updates at
//! different priorities and prints the host operations and the resulting
//! tree after each step.
//!
//! Run with: cargo run -p arbor_demo
//!   config: ARBOR_CONFIG=arbor.toml ARBOR_TRACE_COMMITS=1 cargo run -p arbor_demo

mod app;

use std::rc::Rc;

use arbor_core::component;
use arbor_noop::{run_until_idle, NoopHost};
use arbor_reconciler::{create_root_with_config, ConfigError, Root, RootConfig};
use arbor_scheduler::{LocalScheduler, PriorityLevel, YieldPolicy};

use crate::app::Controls;

/// Path of an optional TOML config file
const ENV_CONFIG_PATH: &str = "ARBOR_CONFIG";

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    log::info!(
        "Root config: max_render_retries={}, trace_commits={}",
        config.max_render_retries,
        config.trace_commits
    );

    let host = Rc::new(NoopHost::new());
    let scheduler = Rc::new(LocalScheduler::new(YieldPolicy::AfterChecks(4)));
    let root = create_root_with_config(host.create_container(), host.clone(), scheduler.clone(), config);
    let controls = Controls::default();
    let demo = Demo {
        host: &host,
        scheduler: &scheduler,
        root: &root,
    };

    demo.step("mount", || root.render(component(&app::todo_app(&controls))));
    demo.step("add item (sync)", || {
        scheduler.run_with_priority(PriorityLevel::Immediate, || controls.add("test"))
    });
    demo.step("reverse list (default)", || controls.reverse());
    demo.step("toggle item (input)", || {
        scheduler.run_with_priority(PriorityLevel::UserBlocking, || controls.toggle("write"))
    });
    demo.step("unmount", || root.unmount());

    for error in root.take_errors() {
        log::error!("Render error: {}", error);
    }
}

fn load_config() -> Result<RootConfig, ConfigError> {
    let config = match std::env::var(ENV_CONFIG_PATH) {
        Ok(path) => {
            log::info!("Loading config from {}", path);
            RootConfig::load(path)?
        }
        Err(_) => RootConfig::default(),
    };
    config.with_env_overrides()
}

struct Demo<'a> {
    host: &'a NoopHost,
    scheduler: &'a LocalScheduler,
    root: &'a Root<NoopHost>,
}

impl Demo<'_> {
    /// Run `f`, drain all work and print what reached the host
    fn step(&self, name: &str, f: impl FnOnce()) {
        println!("== {}", name);
        f();
        let slices = run_until_idle(self.host, self.scheduler);

        let ops = self.host.take_mutations();
        println!("   {} scheduler slices, {} host mutations", slices, ops.len());
        for op in &ops {
            match serde_json::to_string(op) {
                Ok(line) => println!("   {}", line),
                Err(e) => log::warn!("Failed to encode {:?}: {}", op, e),
            }
        }

        match serde_json::to_string_pretty(&self.root.container().to_json()) {
            Ok(tree) => println!("{}\n", tree),
            Err(e) => log::warn!("Failed to encode tree: {}", e),
        }
    }
}
