//! Outbound transition delivery. Both sinks are fire-and-forget: a failed
//! delivery is logged and the committed write stands.

use proto::eventbus::{
    issues_events_service_client::IssuesEventsServiceClient, BoardState as ProtoBoardState,
    IssueTransitionEvent,
};
use tokio::runtime::Handle;
use tonic::{transport::Channel, Request};

use crate::engine::model::BoardState;
use crate::engine::{Transition, TransitionSink};

/// Publishes transitions to the event bus for notification and webhook
/// dispatch.
pub struct EventBusSink {
    client: IssuesEventsServiceClient<Channel>,
    runtime: Handle,
}

impl EventBusSink {
    pub async fn connect(url: String) -> Result<Self, tonic::transport::Error> {
        let client = IssuesEventsServiceClient::connect(url).await?;
        Ok(Self {
            client,
            runtime: Handle::current(),
        })
    }
}

impl TransitionSink for EventBusSink {
    fn record_transition(&self, transition: &Transition) {
        let request = Request::new(transition_event(transition));
        let issue_id = transition.issue_id.clone();
        let mut client = self.client.clone();
        self.runtime.spawn(async move {
            if let Err(status) = client.issue_transitioned(request).await {
                tracing::warn!(%issue_id, %status, "failed to publish issue transition");
            }
        });
    }
}

/// Writes transitions to the log only.
pub struct LogSink;

impl TransitionSink for LogSink {
    fn record_transition(&self, transition: &Transition) {
        tracing::info!(
            issue_id = %transition.issue_id,
            project_id = %transition.project_id,
            kind = %transition.kind,
            actor_id = %transition.actor_id,
            from_column = ?transition.old_state.column_id,
            from_status = %transition.old_state.status,
            to_column = ?transition.new_state.column_id,
            to_status = %transition.new_state.status,
            version = transition.version,
            "issue transition"
        );
    }
}

pub fn transition_event(transition: &Transition) -> IssueTransitionEvent {
    IssueTransitionEvent {
        issue_id: transition.issue_id.clone(),
        project_id: transition.project_id.clone(),
        old_state: Some(board_state(&transition.old_state)),
        new_state: Some(board_state(&transition.new_state)),
        actor_id: transition.actor_id.clone(),
        version: transition.version,
        kind: transition.kind.to_string(),
    }
}

fn board_state(state: &BoardState) -> ProtoBoardState {
    ProtoBoardState {
        column_id: state.column_id.clone(),
        status: state.status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::IssueStatus;
    use crate::engine::TransitionKind;

    #[test]
    fn event_carries_both_board_states() {
        let transition = Transition {
            issue_id: "i1".into(),
            project_id: "p1".into(),
            old_state: BoardState {
                column_id: None,
                status: IssueStatus::Open,
            },
            new_state: BoardState {
                column_id: Some("done".into()),
                status: IssueStatus::Closed,
            },
            actor_id: "u1".into(),
            version: 2,
            kind: TransitionKind::Move,
        };

        let event = transition_event(&transition);
        assert_eq!(event.kind, "move");
        assert_eq!(event.version, 2);
        let old = event.old_state.unwrap();
        assert_eq!(old.column_id, None);
        assert_eq!(old.status, "open");
        let new = event.new_state.unwrap();
        assert_eq!(new.column_id.as_deref(), Some("done"));
        assert_eq!(new.status, "closed");
    }
}
