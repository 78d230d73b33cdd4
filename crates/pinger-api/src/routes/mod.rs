mod pinger;

pub use pinger::router;
