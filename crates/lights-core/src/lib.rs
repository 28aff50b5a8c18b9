#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod adc;
pub mod battery;
pub mod config;
pub mod fade;
pub mod ledc;
pub mod output;
pub mod retry;
pub mod wakelock;

#[cfg(feature = "std")]
pub mod mailbox;
