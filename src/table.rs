use tabled::builder::Builder;
use tabled::settings::Style;

use crate::format::Row;
use crate::model::Dimension;

fn node_columns(dimension: Dimension) -> Vec<&'static str> {
    match dimension {
        Dimension::Cpu => vec![
            "CPU USE",
            "CPU REQ",
            "CPU REQ(%)",
            "CPU LIM",
            "CPU LIM(%)",
            "CPU CAPACITY",
        ],
        Dimension::Memory => vec![
            "MEM USE",
            "MEM REQ",
            "MEM REQ(%)",
            "MEM LIM",
            "MEM LIM(%)",
            "MEM CAPACITY",
        ],
        Dimension::Gpu => vec![
            "NVIDIA/GPU REQ",
            "NVIDIA/GPU REQ(%)",
            "NVIDIA/GPU LIM",
            "NVIDIA/GPU LIM(%)",
        ],
        Dimension::Pod => vec!["POD COUNT", "POD(%)"],
        Dimension::All => Dimension::NODE.into_iter().flat_map(node_columns).collect(),
    }
}

fn pod_columns(dimension: Dimension) -> Vec<&'static str> {
    match dimension {
        Dimension::Cpu => vec!["CPU USE", "CPU USE(%)", "CPU REQ", "CPU LIM"],
        Dimension::Memory => vec!["MEM USE", "MEM USE(%)", "MEM REQ", "MEM LIM"],
        Dimension::Gpu => vec!["NVIDIA/GPU REQ", "NVIDIA/GPU LIM"],
        Dimension::Pod => Vec::new(),
        Dimension::All => Dimension::POD.into_iter().flat_map(pod_columns).collect(),
    }
}

pub fn node_header(dimensions: &[Dimension]) -> Row {
    std::iter::once("NODE")
        .chain(dimensions.iter().flat_map(|dimension| node_columns(*dimension)))
        .map(str::to_string)
        .collect()
}

pub fn pod_header(dimensions: &[Dimension]) -> Row {
    ["NAMESPACE", "POD NAME"]
        .into_iter()
        .chain(dimensions.iter().flat_map(|dimension| pod_columns(*dimension)))
        .map(str::to_string)
        .collect()
}

pub fn render(header: Row, rows: Vec<Row>, plain: bool) -> String {
    let mut builder = Builder::default();
    builder.push_record(header);
    for row in rows {
        builder.push_record(row);
    }

    let mut table = builder.build();
    if plain {
        table.with(Style::blank());
    } else {
        table.with(Style::rounded());
    }
    table.to_string()
}
