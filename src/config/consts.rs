// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Maximum number of submission records kept in history
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;
/// Entry ceiling for the LRU cache when none is configured
pub const DEFAULT_LRU_CAPACITY: usize = 256;
/// Footprint ceiling for the RAM-pressure cache when none is configured (1 GiB)
pub const DEFAULT_RAM_CEILING_BYTES: usize = 1 << 30;
/// Log filter used when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "promptwood=info";
