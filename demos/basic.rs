use paywithterra::PayWithTerraClient;
use serde_json::json;

fn main() -> anyhow::Result<()> {
    let client = PayWithTerraClient::from_env().map_err(anyhow::Error::msg)?;

    let order = client.create_order(&json!({
        "address": std::env::var("PAYWITHTERRA_ADDRESS")?,
        "amount": 1_000_000,
        "denom": "uusd",
        "memo": "demo order",
    }))?;
    if !order.is_success() {
        anyhow::bail!("order was not created (status {}): {}", order.status, order.body);
    }
    println!("created order: {}", order.body);

    if let Some(uuid) = order.body.get("uuid").and_then(|uuid| uuid.as_str()) {
        let paid = client.is_order_paid_by_uuid(uuid)?;
        println!("order {uuid} paid: {paid}");
    }

    let streams = client.list_streams()?;
    println!("streams: {}", streams.body);
    if let Some(remaining) = streams.header("x-ratelimit-remaining") {
        println!("rate limit remaining: {remaining}");
    }

    Ok(())
}
