// Write channel request/response types
//
// Bodies for the HTTP command endpoints. Responses use `#[serde(default)]`
// throughout so an empty or partial body still decodes; the core layer
// decides what a missing field means.

use serde::{Deserialize, Deserializer, Serialize};

// ── Light state ──────────────────────────────────────────────────────

/// Partial light state, as sent in `PUT /api/lights/{id}/state` and echoed
/// back in the accepted-state response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightStatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    /// 0-100
    #[serde(
        default,
        deserialize_with = "deserialize_percent",
        skip_serializing_if = "Option::is_none"
    )]
    pub brightness: Option<u8>,
    /// Kelvin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp: Option<u16>,
}

/// Decode a 0-100 percentage from any JSON number. Fractional values are
/// rounded and anything outside the range is clamped.
pub fn deserialize_percent<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.filter(|value| value.is_finite()).map(|value| {
        // clamped first, so the cast is exact
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = value.round().clamp(0.0, 100.0) as u8;
        percent
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LightStateResponse {
    pub id: String,
    pub state: LightStatePayload,
}

// ── Bulk power & scenes ──────────────────────────────────────────────

/// Body of `PUT /api/rooms/{id}/lights` and `PUT /api/zones/{id}/lights`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupPowerRequest {
    pub on: bool,
}

/// One entity touched by a bulk write or scene activation, with the value
/// the server applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedEntity {
    pub kind: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(flatten)]
    pub state: LightStatePayload,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AffectedResponse {
    pub affected: Vec<AffectedEntity>,
}

// ── Errors ───────────────────────────────────────────────────────────

/// Error body returned with non-2xx responses. The server is not
/// consistent about which field it fills.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.error).filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn light_state_payload_omits_unset_fields() {
        let body = LightStatePayload {
            on: Some(true),
            brightness: None,
            color_temp: Some(2700),
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({ "on": true, "colorTemp": 2700 })
        );
    }

    #[test]
    fn affected_entity_flattens_state() {
        let raw = json!({
            "affected": [
                { "kind": "light", "id": "l1", "parentId": "r1", "on": true, "brightness": 40 },
                { "kind": "room", "id": "r1", "on": true }
            ]
        });
        let resp: AffectedResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(resp.affected.len(), 2);
        assert_eq!(resp.affected[0].parent_id.as_deref(), Some("r1"));
        assert_eq!(resp.affected[0].state.brightness, Some(40));
        assert_eq!(resp.affected[1].state.on, Some(true));
        assert!(resp.affected[1].state.color_temp.is_none());
    }

    #[test]
    fn accepted_state_tolerates_fractional_brightness() {
        let resp: LightStateResponse = serde_json::from_value(
            json!({ "id": "l1", "state": { "on": true, "brightness": 54.3 } }),
        )
        .unwrap();
        assert_eq!(resp.state.brightness, Some(54));

        let resp: LightStateResponse =
            serde_json::from_value(json!({ "id": "l1", "state": { "brightness": null } }))
                .unwrap();
        assert_eq!(resp.state.brightness, None);
    }

    #[test]
    fn error_body_prefers_message() {
        let body: ErrorBody =
            serde_json::from_value(json!({ "error": "bad_request", "message": "hub offline" }))
                .unwrap();
        assert_eq!(body.into_message().as_deref(), Some("hub offline"));

        let body: ErrorBody = serde_json::from_value(json!({ "error": "bad_request" })).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("bad_request"));
    }
}
