//! Kubernetes Event emission

use k8s_openapi::api::core::v1::Event;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{
    api::{Api, ObjectMeta, PostParams},
    Client, Resource, ResourceExt,
};
use tracing::warn;

use crate::error::Result;

pub const EVENT_TYPE_NORMAL: &str = "Normal";
pub const EVENT_TYPE_WARNING: &str = "Warning";

/// Event messages are capped so Helm output cannot blow past API limits
const MAX_MESSAGE_LEN: usize = 1024;

/// Create an Event about `obj`
///
/// Cluster-scoped objects get their Events in the `default` namespace.
pub async fn emit_event<K>(
    client: &Client,
    obj: &K,
    event_type: &str,
    reason: &str,
    message: &str,
) -> Result<()>
where
    K: Resource<DynamicType = ()>,
{
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let events: Api<Event> = Api::namespaced(client.clone(), &namespace);

    let time = chrono::Utc::now();
    let event = Event {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-event-", obj.name_any())),
            ..Default::default()
        },
        type_: Some(event_type.to_string()),
        reason: Some(reason.to_string()),
        message: Some(truncate(message, MAX_MESSAGE_LEN)),
        involved_object: obj.object_ref(&()),
        first_timestamp: Some(Time(time)),
        last_timestamp: Some(Time(time)),
        count: Some(1),
        ..Default::default()
    };

    events.create(&PostParams::default(), &event).await?;
    Ok(())
}

/// Like [`emit_event`], but only logs a failure
pub async fn publish<K>(client: &Client, obj: &K, event_type: &str, reason: &str, message: &str)
where
    K: Resource<DynamicType = ()>,
{
    if let Err(e) = emit_event(client, obj, event_type, reason, message).await {
        warn!(reason, "Failed to emit event for {}: {}", obj.name_any(), e);
    }
}

fn truncate(message: &str, max: usize) -> String {
    if message.len() <= max {
        return message.to_string();
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &message[..end])
}
