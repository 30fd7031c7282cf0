//! Sample playback driven from the processing thread.
//!
//! Files are decoded and resampled on executor threads, handed to the
//! processing thread without locks, and retired through a lock-free list so
//! the processing thread never frees memory.
//!
//! # Example
//!
//! ```ignore
//! use tandem_sampler::{SamplePlayer, SamplePlayerConfig};
//!
//! let mut player = SamplePlayer::new(SamplePlayerConfig::default())?;
//! player.init(executor, &meta)?;
//! let ui = player.requester();
//!
//! // UI thread
//! ui.play_sample("kick.wav", 0, false);
//!
//! // Processing thread, once per block
//! player.process(&mut ports, block_size);
//! ```

pub mod error;
pub use error::{Error, Result};

mod sample;
pub use sample::Sample;

mod gc;
pub use gc::{GcBatch, GcList};

mod task;
pub use task::{GcTask, LoadTask};

mod channel;
pub use channel::ChannelPlayer;

mod player;
pub use player::{PlayRequest, SamplePlayer, SamplePlayerConfig, SampleRequester};
