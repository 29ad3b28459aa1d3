pub mod updater;
