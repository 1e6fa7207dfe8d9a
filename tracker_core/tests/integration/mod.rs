mod active_sampling;
mod cloud_ledger;
mod config_update;
mod passive_sampling;
mod shutdown;
