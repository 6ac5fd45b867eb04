use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct OrderResponse {
  pub id: u64,
  pub item: String,
  pub quantity: u32,
  pub created_at: DateTime<Utc>
}
