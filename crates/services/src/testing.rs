use std::sync::Arc;

use curator_backend::MemoryBackend;
use curator_mutation::RetrySettings;

pub(crate) fn backend() -> Arc<MemoryBackend> {
	Arc::new(MemoryBackend::new())
}

/// Three retries, 10ms linear backoff.
pub(crate) fn fast_retry() -> RetrySettings {
	RetrySettings {
		retries: 3,
		retry_delay_ms: 10,
		retry_rate_limited: false,
	}
}
