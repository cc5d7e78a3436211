pub mod detector;

pub use detector::{
    change_channel, ChangeDetector, ChangeSignal, ChangeSignalReceiver, ChangeSignalSender,
    DetectorState,
};
