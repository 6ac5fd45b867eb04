use serde::Deserialize;

#[derive(Deserialize)]
pub struct CreateOrderRequest {
  pub item: String,
  pub quantity: u32
}

#[derive(Deserialize)]
pub struct SlowQuery {
  pub ms: Option<u64>
}
