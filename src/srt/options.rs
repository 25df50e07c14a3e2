//! Translation from configured SRT settings to socket options

use srt_tokio::options::{ByteCount, DataRate, LiveBandwidthMode, SocketOptions};

use super::SrtSettings;

/// Apply the configured option set to a socket before bind/connect
///
/// Covers both connection roles; options a role does not use are ignored by
/// the transport.
pub fn apply(settings: &SrtSettings, options: &mut SocketOptions) {
    options.receiver.latency = settings.latency_duration();
    options.connect.timeout = settings.connection_timeout();

    if settings.max_bw > 0 {
        options.sender.bandwidth = LiveBandwidthMode::Max(DataRate(settings.max_bw as u64));
    }
    if let Some(bytes) = settings.input_buffer {
        options.receiver.buffer_size = ByteCount(bytes);
    }
    if let Some(bytes) = settings.output_buffer {
        options.sender.buffer_size = ByteCount(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_apply_sets_latency_and_timeout() {
        let settings = SrtSettings {
            latency: 250,
            connection_timeout: 1500,
            ..SrtSettings::default()
        };
        let mut options = SocketOptions::default();
        apply(&settings, &mut options);
        assert_eq!(options.receiver.latency, Duration::from_millis(250));
        assert_eq!(options.connect.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_max_bw_applied_only_when_positive() {
        let mut options = SocketOptions::default();
        apply(
            &SrtSettings {
                max_bw: 2_000_000,
                ..SrtSettings::default()
            },
            &mut options,
        );
        assert!(matches!(
            options.sender.bandwidth,
            LiveBandwidthMode::Max(DataRate(2_000_000))
        ));
    }

    #[test]
    fn test_buffers_applied_when_configured() {
        let settings = SrtSettings {
            input_buffer: Some(65536),
            output_buffer: Some(32768),
            ..SrtSettings::default()
        };
        let mut options = SocketOptions::default();
        apply(&settings, &mut options);
        assert_eq!(options.receiver.buffer_size, ByteCount(65536));
        assert_eq!(options.sender.buffer_size, ByteCount(32768));
    }
}
