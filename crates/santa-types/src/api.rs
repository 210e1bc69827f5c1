use serde::{Deserialize, Serialize};

use crate::models::Pairing;
use crate::{GroupId, UserId};

// -- JWT Claims --

/// Bearer token claims. Tokens are issued by the account service; this
/// workspace only validates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub exp: usize,
}

// -- Draw --

#[derive(Debug, Serialize, Deserialize)]
pub struct DrawResponse {
    pub group_id: GroupId,
    pub participants: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub feasible: bool,
    pub sample: Option<Vec<Pairing>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiverResponse {
    pub receiver_user_id: Option<UserId>,
}

// -- Exclusions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddExclusionRequest {
    pub user_id: UserId,
    pub excluded_user_id: UserId,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
