//! Properties of the block graph, checked against the full decode path.

mod common;

use std::collections::HashSet;

use common::two_hop_records;
use flow_data::links::links_response;
use flow_graph::{
    decode_links, BlockGraph, DecodeError, ForceConfig, Group, Link, Node, Simulation,
    TransactionRecord,
};

fn node(id: &str, group: Group) -> Node {
    Node {
        id: id.to_string(),
        group,
    }
}

fn link(source: &str, target: &str) -> Link {
    Link {
        source: source.to_string(),
        target: target.to_string(),
    }
}

fn assert_referentially_complete(graph: &BlockGraph) {
    let ids: HashSet<&str> = graph.nodes().map(|n| n.id.as_str()).collect();
    assert_eq!(ids.len(), graph.node_count(), "node ids must be unique");
    for l in graph.links() {
        assert!(ids.contains(l.source.as_str()), "missing source {}", l.source);
        assert!(ids.contains(l.target.as_str()), "missing target {}", l.target);
    }
}

#[test]
fn two_hop_chain_keeps_recipient_group_for_relay() {
    // 0xB is first seen as a recipient, so sending later does not make it `from`
    let graph = BlockGraph::from_links_json(r#"[{"0xA":"0xB"},{"0xB":"0xC"}]"#).unwrap();

    assert_eq!(
        graph.nodes().cloned().collect::<Vec<_>>(),
        vec![
            node("0xA", Group::From),
            node("0xB", Group::To),
            node("0xC", Group::To),
        ]
    );
    assert_eq!(graph.links(), vec![link("0xA", "0xB"), link("0xB", "0xC")]);
    assert_referentially_complete(&graph);
}

#[test]
fn first_seen_group_is_stable() {
    let records = vec![
        TransactionRecord::single("0xA", "0xB"),
        TransactionRecord::single("0xC", "0xD"),
        TransactionRecord::single("0xE", "0xA"),
        TransactionRecord::single("0xD", "0xF"),
    ];
    let graph = BlockGraph::build(&records);

    assert_eq!(graph.node("0xA").unwrap().group, Group::From);
    assert_eq!(graph.node("0xD").unwrap().group, Group::To);
    assert_eq!(graph.link_count(), 4);
    assert_referentially_complete(&graph);
}

#[test]
fn empty_block_has_no_nodes_or_links() {
    let graph = BlockGraph::from_links_json("[]").unwrap();
    assert!(graph.is_empty());
    assert_eq!(graph.link_count(), 0);
}

#[test]
fn one_sender_many_recipients_shares_source() {
    let records = decode_links(r#"[{"0xA":["0xB","0xC"]}]"#).unwrap();
    let graph = BlockGraph::build(&records);

    assert_eq!(graph.links(), vec![link("0xA", "0xB"), link("0xA", "0xC")]);
    assert_referentially_complete(&graph);
}

#[test]
fn malformed_links_fail_deterministically() {
    for _ in 0..2 {
        let err = BlockGraph::from_links_json("{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }
    assert!(matches!(
        BlockGraph::from_links_json(r#"{"0xA":"0xB"}"#),
        Err(DecodeError::NotAnArray)
    ));
    assert!(matches!(
        BlockGraph::from_links_json(r#"[{"0xA":7}]"#),
        Err(DecodeError::InvalidRecipient { index: 0, .. })
    ));
}

#[test]
fn service_encoding_round_trips_through_builder() {
    let payload = common::sample_block(
        100,
        &[
            ("0xA", Some("0xB")),
            ("0xB", Some("0xC")),
            ("0xA", Some("0xB")),
            ("0xD", None),
        ],
    );
    let response = links_response(&payload).unwrap();
    let graph = BlockGraph::from_links_json(&response.links).unwrap();

    assert_eq!(graph.node_count(), 4);
    // repeated payments stay parallel edges
    assert_eq!(graph.link_count(), 3);
    assert_eq!(graph.node("0xD").unwrap().group, Group::From);
    assert_referentially_complete(&graph);
}

#[test]
fn rebuilding_same_input_is_identical() {
    let records = two_hop_records();
    let first = BlockGraph::build(&records);
    let second = BlockGraph::build(&records);

    assert_eq!(
        first.nodes().collect::<Vec<_>>(),
        second.nodes().collect::<Vec<_>>()
    );
    assert_eq!(first.links(), second.links());
}

#[test]
fn layout_is_deterministic_for_fixed_input() {
    let graph = BlockGraph::build(&two_hop_records());

    let mut a = Simulation::new(&graph, ForceConfig::viewer(1600.0, 1000.0));
    let mut b = Simulation::new(&graph, ForceConfig::viewer(1600.0, 1000.0));
    let ticks_a = a.run(|_| {});
    let ticks_b = b.run(|_| {});

    assert_eq!(ticks_a, ticks_b);
    assert_eq!(a.bodies(), b.bodies());
}
