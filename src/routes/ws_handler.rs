use axum::extract::ws::{Message, WebSocket};
use serde::Serialize;
use tracing::{error, info, warn};

use ktk_core::TimeSeries;

use crate::state::app_state::SignalInfo;

#[derive(Serialize)]
struct SignalPayload {
    timestamp: f64,
    // null for a missing sample
    value: Option<f64>,
    seq: u64,
    end_flag: bool,
}

/// Samples of one flattened column, in time order.
pub fn column_values(series: &TimeSeries, channel: &str, column: usize) -> Option<Vec<f64>> {
    let value = series.get_data(channel).ok()?;
    let width: usize = value.shape()[1..].iter().product();
    if column >= width {
        return None;
    }
    let flat: Vec<f64> = value.iter().copied().collect();
    Some(flat.iter().skip(column).step_by(width).copied().collect())
}

async fn send_payload(socket: &mut WebSocket, payload: &SignalPayload) -> bool {
    let json = match serde_json::to_string(payload) {
        Ok(j) => j,
        Err(e) => {
            error!("json serialize error: {}", e);
            return false;
        }
    };

    if let Err(e) = socket.send(Message::Text(json.into())).await {
        warn!("ws send failed: {}", e);
        return false;
    }
    true
}

pub async fn handle_ws_fetch(mut socket: WebSocket, signal: SignalInfo) {
    info!("ws_fetch streaming started: {}", signal.original_name);

    let values = match column_values(&signal.series, &signal.channel, signal.column) {
        Some(v) => v,
        None => {
            error!("column not found: {}", signal.original_name);
            return;
        }
    };

    let mut seq: u64 = 0;
    for (timestamp, value) in signal.series.time.iter().zip(values) {
        let payload = SignalPayload {
            timestamp: *timestamp,
            value: (!value.is_nan()).then_some(value),
            seq,
            end_flag: false,
        };
        if !send_payload(&mut socket, &payload).await {
            return;
        }
        seq += 1;
    }

    let end_payload = SignalPayload {
        timestamp: signal.series.time.last().copied().unwrap_or(0.0),
        value: None,
        seq,
        end_flag: true,
    };
    if send_payload(&mut socket, &end_payload).await {
        info!("ws_fetch streaming finished: {} ({} samples)", signal.original_name, seq);
    }
}
