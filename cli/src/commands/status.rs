use clap::{Subcommand, ValueEnum};
use presence_core::{NewStatus, RequestContext, StatusError, StatusPatch, StatusService, Store};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::util::{exit_error, parse_json_arg, print_json, report};

#[derive(Subcommand)]
pub enum StatusCommands {
    /// Create a status in a channel
    Create {
        #[arg(long)]
        channel_id: Uuid,
        /// Status fields as JSON, e.g. '{"name": "Busy", "label": "Busy", "blocked": true}'
        #[arg(long)]
        data: String,
    },
    /// Partially update a status (absent fields are kept, `"timer_transition_id": null` clears the edge)
    Update {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        data: String,
    },
    /// Delete a status and unlink everything pointing at it
    Delete {
        #[arg(long)]
        id: Uuid,
    },
    /// Show one status
    Get {
        #[arg(long)]
        id: Uuid,
    },
    /// List statuses, optionally restricted to channels (repeatable)
    List {
        #[arg(long = "channel-id")]
        channel_ids: Vec<Uuid>,
    },
    /// Show the status currently holding a channel selector
    Selector {
        #[arg(long)]
        channel_id: Uuid,
        #[arg(long, value_enum)]
        selector: SelectorArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SelectorArg {
    Starting,
    OnReject,
    OnTimeout,
}

pub async fn run<S: Store>(store: S, ctx: &RequestContext, command: StatusCommands) -> i32 {
    let service = StatusService::new(store);
    match execute(&service, ctx, command).await {
        Ok(body) => print_json(&body),
        Err(err) => report(&err, ctx.correlation_id()),
    }
}

async fn execute<S: Store>(
    service: &StatusService<S>,
    ctx: &RequestContext,
    command: StatusCommands,
) -> Result<Value, StatusError> {
    match command {
        StatusCommands::Create { channel_id, data } => {
            let draft: NewStatus =
                parse_json_arg(&data, "data").unwrap_or_else(|message| exit_error(&message, None));
            service.create(ctx, channel_id, draft).await.map(|s| json!(s))
        }
        StatusCommands::Update { id, data } => {
            let patch: StatusPatch =
                parse_json_arg(&data, "data").unwrap_or_else(|message| exit_error(&message, None));
            service.update(ctx, id, patch).await.map(|s| json!(s))
        }
        StatusCommands::Delete { id } => {
            service.delete(ctx, id).await?;
            Ok(json!({ "deleted": id }))
        }
        StatusCommands::Get { id } => service.get(ctx, id).await.map(|s| json!(s)),
        StatusCommands::List { channel_ids } => {
            let statuses = match channel_ids.as_slice() {
                [] => service.get_all(ctx).await?,
                [channel_id] => service.get_by_channel(ctx, *channel_id).await?,
                many => service.get_by_channels(ctx, many).await?,
            };
            Ok(json!(statuses))
        }
        StatusCommands::Selector {
            channel_id,
            selector,
        } => {
            let holder = match selector {
                SelectorArg::Starting => {
                    service
                        .get_by_channel_and_is_starting(ctx, channel_id, true)
                        .await?
                }
                SelectorArg::OnReject => service.get_on_reject_status(ctx, channel_id).await?,
                SelectorArg::OnTimeout => service.get_on_timeout_status(ctx, channel_id).await?,
            };
            Ok(json!(holder))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_core::memory::MemoryStore;
    use presence_core::{ProvisioningTemplates, TenantProvisioner};

    async fn provisioned() -> (MemoryStore, RequestContext, Uuid) {
        let store = MemoryStore::new();
        let tenant = TenantProvisioner::new(store.clone())
            .provision(
                &RequestContext::background(),
                "t1",
                &ProvisioningTemplates::standard(),
            )
            .await
            .unwrap();
        let state = store.snapshot().await;
        let voice = state
            .channels
            .values()
            .find(|c| c.name == "voice")
            .unwrap()
            .id;
        (store, RequestContext::new(tenant.id, Some("corr-cli")), voice)
    }

    #[tokio::test]
    async fn test_create_then_claim_starting_selector() {
        let (store, ctx, voice) = provisioned().await;
        let service = StatusService::new(store);

        let created = execute(
            &service,
            &ctx,
            StatusCommands::Create {
                channel_id: voice,
                data: r#"{"name": "Coaching", "label": "Coaching", "starting_status": true}"#.into(),
            },
        )
        .await
        .unwrap();

        let holder = execute(
            &service,
            &ctx,
            StatusCommands::Selector {
                channel_id: voice,
                selector: SelectorArg::Starting,
            },
        )
        .await
        .unwrap();
        assert_eq!(holder["id"], created["id"]);
        assert_eq!(holder["name"], "Coaching");
    }

    #[tokio::test]
    async fn test_list_by_channel_and_delete() {
        let (store, ctx, voice) = provisioned().await;
        let service = StatusService::new(store);

        let listed = execute(
            &service,
            &ctx,
            StatusCommands::List {
                channel_ids: vec![voice],
            },
        )
        .await
        .unwrap();
        let statuses = listed.as_array().unwrap();
        let busy = statuses.iter().find(|s| s["name"] == "Busy").unwrap();
        let busy_id: Uuid = serde_json::from_value(busy["id"].clone()).unwrap();

        let deleted = execute(&service, &ctx, StatusCommands::Delete { id: busy_id })
            .await
            .unwrap();
        assert_eq!(deleted["deleted"], json!(busy_id));

        let err = execute(&service, &ctx, StatusCommands::Get { id: busy_id })
            .await
            .unwrap_err();
        assert!(matches!(err, StatusError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_unknown_status_is_not_found() {
        let (store, ctx, _) = provisioned().await;
        let service = StatusService::new(store);

        let err = execute(
            &service,
            &ctx,
            StatusCommands::Update {
                id: Uuid::now_v7(),
                data: r#"{"label": "Renamed"}"#.into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StatusError::NotFound { .. }));
    }
}
