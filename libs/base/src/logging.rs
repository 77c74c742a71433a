// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Logging setup.
//!
//! Every server and client runtime logs through the `log` facade rather
//! than `eprintln!`, the way `m3::server::net` depends on `log` directly.
//! This module is the single place that installs a concrete logger
//! (`env_logger`), so servers can be started from tests without clashing
//! over global logger initialization.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs the process-wide logger, once.
///
/// `component` is the server or client name; it's attached as a log
/// target prefix so interleaved server output in the test runner stays
/// attributable, mirroring the `[tile:name@...]` prefix the teacher's
/// bespoke logger prints per component.
pub fn init(component: &str) {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .format_timestamp_millis()
        .try_init();
    });
    log::debug!(target: "nvx::bootstrap", "logging ready for component '{}'", component);
}
