//! E2E test suite entry point.

mod fixture;
mod lane_workflow;
mod policy_workflow;
mod weekly_sync_workflow;
