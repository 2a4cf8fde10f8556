//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the acquisition loop
//! stalls.  The timeout is derived from the read interval so one slow cycle
//! (five blocking acquisitions per tank) never trips it.
//!
//! The main loop must call `feed()` once per cycle, and
//! `follow_interval()` whenever the read interval may have changed.

#[cfg(feature = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

/// Lower bound on the watchdog timeout (ms).
pub const MIN_TIMEOUT_MS: u32 = 10_000;

/// Watchdog timeout for a given cycle period: three missed cycles, at
/// least [`MIN_TIMEOUT_MS`].
pub fn timeout_for_interval(read_interval_ms: u32) -> u32 {
    read_interval_ms.saturating_mul(3).max(MIN_TIMEOUT_MS)
}

pub struct Watchdog {
    timeout_ms: u32,
    #[cfg(feature = "espidf")]
    subscribed: bool,
    #[cfg(not(feature = "espidf"))]
    feeds: core::cell::Cell<u64>,
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(feature = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({}ms timeout, panic on trigger)", timeout_ms);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self {
                    timeout_ms,
                    subscribed,
                }
            }
        }

        #[cfg(not(feature = "espidf"))]
        {
            info!("Watchdog(sim): {}ms, no-op", timeout_ms);
            Self {
                timeout_ms,
                feeds: core::cell::Cell::new(0),
            }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Re-derive the timeout from the current read interval.  Returns
    /// whether the TWDT was reconfigured.
    pub fn follow_interval(&mut self, read_interval_ms: u32) -> bool {
        let timeout_ms = timeout_for_interval(read_interval_ms);
        if timeout_ms == self.timeout_ms {
            return false;
        }

        #[cfg(feature = "espidf")]
        {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
            if ret != ESP_OK {
                log::warn!("Watchdog: reconfigure to {}ms failed ({})", timeout_ms, ret);
                return false;
            }
        }

        info!("Watchdog: timeout {}ms -> {}ms", self.timeout_ms, timeout_ms);
        self.timeout_ms = timeout_ms;
        true
    }

    /// Feed the watchdog.  Must be called at least once per timeout.
    pub fn feed(&self) {
        #[cfg(feature = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }

        #[cfg(not(feature = "espidf"))]
        self.feeds.set(self.feeds.get() + 1);
    }

    /// Number of feeds since construction (simulation only).
    #[cfg(not(feature = "espidf"))]
    pub fn feed_count(&self) -> u64 {
        self.feeds.get()
    }
}
