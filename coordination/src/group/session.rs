//! Session runner: many independent groups, one tokio task each.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::info;

use super::coordinator::{GroupCoordinator, GroupReport};
use super::matching::{SeatFactory, SeatPlan, WaitingRoom};
use crate::config::SessionConfig;
use crate::error::{ConfigurationError, SessionError};
use crate::events::SharedEventBus;

pub struct SessionRunner {
    config: Arc<SessionConfig>,
    bus: SharedEventBus,
}

impl SessionRunner {
    pub fn new(config: SessionConfig, bus: SharedEventBus) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            bus,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn bus(&self) -> SharedEventBus {
        self.bus.clone()
    }

    pub fn waiting_room(&self) -> WaitingRoom {
        WaitingRoom::new(&self.config)
    }

    /// Form the group at `index` (group id `index + 1`).
    pub fn form_group(
        &self,
        index: u32,
        plans: Vec<SeatPlan>,
        factory: &dyn SeatFactory,
    ) -> Result<GroupCoordinator, ConfigurationError> {
        GroupCoordinator::form(
            index + 1,
            index,
            self.config.clone(),
            plans,
            factory,
            self.bus.clone(),
        )
    }

    /// Run formed groups concurrently and collect their reports by group id.
    pub async fn run(&self, groups: Vec<GroupCoordinator>) -> Result<Vec<GroupReport>, SessionError> {
        let mut tasks = JoinSet::new();
        for group in groups {
            tasks.spawn(group.run());
        }

        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let report = joined.map_err(|e| SessionError::Join(e.to_string()))??;
            reports.push(report);
        }
        reports.sort_by_key(|r| r.group);

        info!(
            session = %self.config.session_id,
            groups = reports.len(),
            "Session complete"
        );
        Ok(reports)
    }

    /// Run `count` groups with no participants connected: every seat, human
    /// or not, goes to its configured bot.
    pub async fn run_unattended(
        &self,
        count: u32,
        factory: &dyn SeatFactory,
    ) -> Result<Vec<GroupReport>, SessionError> {
        let room = self.waiting_room();
        let groups = (0..count)
            .map(|index| self.form_group(index, room.plan(Vec::new()), factory))
            .collect::<Result<Vec<_>, _>>()?;
        self.run(groups).await
    }
}
