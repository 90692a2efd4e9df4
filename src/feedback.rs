//! Qualitative description of a measured download speed. Pure function over
//! the numeric result; no engine dependency.

pub fn describe(download_mbps: f64) -> &'static str {
    if download_mbps >= 200.0 {
        "Very fast connection. Handles 4K streaming and gaming across several devices at once."
    } else if download_mbps >= 150.0 {
        "Fast connection. Comfortable for high-quality streaming and gaming simultaneously."
    } else if download_mbps >= 100.0 {
        "Good connection. Enough for HD streaming and everyday use in a small household."
    } else if download_mbps >= 50.0 {
        "Basic connection. Fine for single-device HD streaming and general browsing."
    } else {
        "Slow connection. Expect buffering in HD playback and lag in online games."
    }
}
