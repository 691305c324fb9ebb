use serde_json::{Value, json};

use super::entry::{EntryBody, MoveEntry};
use super::record::GameRecord;

fn entry_to_value(entry: &MoveEntry) -> Value {
    let comments: Vec<Value> = entry
        .annotations()
        .iter()
        .map(|a| json!({ "name": a.name, "comment": a.comment }))
        .collect();

    match entry.body() {
        EntryBody::Move(play) => json!({
            "number": play.number,
            "move": play.text,
            "from": play.disambiguator,
            "elapsed": play.elapsed,
            "cumulative": play.cumulative,
            "comments": comments,
        }),
        EntryBody::Footer(text) => json!({ "text": text, "comments": comments }),
        EntryBody::Note { move_number } => json!({
            "number": move_number,
            "comments": comments,
        }),
    }
}

/// JSON array of the move list (footer excluded).
pub fn moves_to_json(record: &GameRecord) -> String {
    Value::Array(record.iter().map(entry_to_value).collect()).to_string()
}

pub fn record_to_json(record: &GameRecord) -> String {
    let started_at = record
        .started_at()
        .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S").to_string());

    json!({
        "name": record.display_name(),
        "header": record.header(),
        "kisen": record.kisen(),
        "teai": record.teai(),
        "sente": record.sente(),
        "gote": record.gote(),
        "started_at": started_at,
        "moves": record.iter().map(entry_to_value).collect::<Vec<_>>(),
        "footer": record.footer().map(entry_to_value),
    })
    .to_string()
}
