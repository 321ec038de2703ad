//! Four-band call-timing classification, grounded on
//! `netbox_client.py::log_netbox_timing`: ok (<2s), slow (2-5s), throttled
//! (5-20s), severe (>20s), each logged once per call at an escalating level.

use std::future::Future;
use std::time::{Duration, Instant};

const SLOW: Duration = Duration::from_secs(2);
const THROTTLED: Duration = Duration::from_secs(5);
const SEVERE: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Ok,
    Slow,
    Throttled,
    Severe,
}

pub fn classify(elapsed: Duration) -> Band {
    if elapsed >= SEVERE {
        Band::Severe
    } else if elapsed >= THROTTLED {
        Band::Throttled
    } else if elapsed >= SLOW {
        Band::Slow
    } else {
        Band::Ok
    }
}

/// Wrap a call with a timer, logging the elapsed time at a level matching
/// its severity band.
pub async fn with_timing<F, Fut, T>(name: &str, op: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let start = Instant::now();
    let result = op().await;
    let elapsed = start.elapsed();
    match classify(elapsed) {
        Band::Ok => log::debug!("netbox call {name} took {:?}", elapsed),
        Band::Slow => log::info!("netbox call {name} slow: {:?}", elapsed),
        Band::Throttled => log::warn!("netbox call {name} throttled: {:?}", elapsed),
        Band::Severe => log::error!("netbox call {name} severe: {:?}", elapsed),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_bands() {
        assert_eq!(classify(Duration::from_millis(500)), Band::Ok);
        assert_eq!(classify(Duration::from_secs(3)), Band::Slow);
        assert_eq!(classify(Duration::from_secs(10)), Band::Throttled);
        assert_eq!(classify(Duration::from_secs(25)), Band::Severe);
    }
}
