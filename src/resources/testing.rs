//! Test fixtures shared by the resource kinds.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::credentials::{ENV_ACCESS_KEY_PATH, ENV_PROJECT, ENV_SERVICE_ACCOUNT, EnvSnapshot};
use crate::prompt::AssumeAnswer;
use crate::provider::fake::{FakeCloud, FakeConnector};
use crate::reconciler::{ApplyContext, ApplyOptions, Siblings};

pub const CHECK: ApplyOptions = ApplyOptions {
    check: true,
    allow_reboot: false,
    allow_recreate: false,
};

pub const NO_CHECK: ApplyOptions = ApplyOptions {
    check: false,
    allow_reboot: false,
    allow_recreate: false,
};

pub fn test_env() -> EnvSnapshot {
    EnvSnapshot::from_vars([
        (ENV_PROJECT, "test-project"),
        (ENV_SERVICE_ACCOUNT, "deployer@test-project.iam.gserviceaccount.com"),
        (ENV_ACCESS_KEY_PATH, "/keys/deployer.pem"),
    ])
}

/// A fake cloud plus everything an [`ApplyContext`] borrows.
pub struct Harness {
    pub cloud: Arc<FakeCloud>,
    pub connector: FakeConnector,
    pub env: EnvSnapshot,
    pub siblings: Siblings,
    pub prompt: AssumeAnswer,
}

impl Harness {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let cloud = FakeCloud::new();
        Self {
            connector: FakeConnector::new(cloud.clone()),
            cloud,
            env: test_env(),
            siblings: Siblings::new(),
            prompt: AssumeAnswer(true),
        }
    }

    pub fn ctx(&self) -> ApplyContext<'_> {
        ApplyContext {
            connector: &self.connector,
            prompt: &self.prompt,
            env: &self.env,
            siblings: &self.siblings,
        }
    }
}
