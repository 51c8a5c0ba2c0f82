//! End-to-end tests for constant replication.
//!
//! Each test builds a placed graph, runs [`ReplicateConstantsPass`] through
//! the [`GraphPass`] entry point, and checks the rewritten structure.
//!
//! Tests cover:
//! - The host-spread scenario and its rendered result
//! - Threshold boundary (16 replicated, 17 skipped and recorded)
//! - Single-consumer, control-out and same-host skips
//! - Abort on a malformed consumer device, keeping earlier rewrites
//! - Graph-wide properties: idempotence, fan-out preservation, control
//!   fan-in, name uniqueness

use std::collections::{HashMap, HashSet};

use constrep_core::device::device_name_to_cpu_device_name;
use constrep_core::{DType, Graph, GraphEdge, Node, NodeId, TensorProto};
use constrep_pass::replicate::SkippedRange;
use constrep_pass::{GraphPass, PassError, PassOptions, PassReport, ReplicateConstantsPass};
use proptest::prelude::*;

const T0_CPU: &str = "/job:worker/replica:0/task:0/device:CPU:0";
const T0_GPU: &str = "/job:worker/replica:0/task:0/device:GPU:0";
const T1_CPU: &str = "/job:worker/replica:0/task:1/device:CPU:0";
const T1_CPU1: &str = "/job:worker/replica:0/task:1/device:CPU:1";
const T2_GPU: &str = "/job:worker/replica:0/task:2/device:GPU:0";

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn run(graph: &mut Graph) -> Result<PassReport, PassError> {
    init_tracing();
    ReplicateConstantsPass::default().run(PassOptions::new(graph))
}

fn constant(graph: &mut Graph, name: &str, dims: &[i64], device: &str) -> NodeId {
    graph
        .add_node(Node::constant(name, TensorProto::new(DType::F32, dims)).on_device(device))
        .unwrap()
}

fn op(graph: &mut Graph, name: &str, op: &str, device: &str) -> NodeId {
    graph.add_node(Node::op(name, op).on_device(device)).unwrap()
}

/// Constant `name` with `dims` on task 0, feeding one consumer on each of
/// task 0 and task 1.
fn spread_constant(graph: &mut Graph, name: &str, dims: &[i64]) -> NodeId {
    let c = constant(graph, name, dims, T0_CPU);
    let a = op(graph, &format!("{}_use0", name), "Add", T0_CPU);
    let b = op(graph, &format!("{}_use1", name), "Add", T1_CPU);
    graph.add_data_edge(c, 0, a, 0).unwrap();
    graph.add_data_edge(c, 0, b, 0).unwrap();
    c
}

fn render(graph: &Graph) -> String {
    graph.to_graph_def().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn small_constant_replicated_per_host() {
    let mut graph = Graph::new();
    let init = op(&mut graph, "init", "NoOp", T0_CPU);
    let c = constant(&mut graph, "c", &[4], T0_CPU);
    let x = op(&mut graph, "x", "Add", T0_CPU);
    let y = op(&mut graph, "y", "Add", T1_CPU);
    let z = op(&mut graph, "z", "Mul", T0_CPU);
    graph.add_control_edge(init, c).unwrap();
    graph.add_data_edge(c, 0, x, 0).unwrap();
    graph.add_data_edge(c, 0, y, 0).unwrap();
    graph.add_data_edge(c, 0, z, 0).unwrap();

    let report = run(&mut graph).unwrap();

    assert!(graph.find("c").is_none());
    assert_eq!(report.replicas_created(), 2);
    assert_eq!(report.skipped_oversized, None);
    let consumers: Vec<usize> = report.replications[0]
        .replicas
        .iter()
        .map(|r| r.consumers)
        .collect();
    assert_eq!(consumers, vec![2, 1]);

    insta::assert_snapshot!(render(&graph), @r"
    init = NoOp @/job:worker/replica:0/task:0/device:CPU:0
    x = Add @/job:worker/replica:0/task:0/device:CPU:0 <- c/replicate/_0
    y = Add @/job:worker/replica:0/task:1/device:CPU:0 <- c/replicate/_1
    z = Mul @/job:worker/replica:0/task:0/device:CPU:0 <- c/replicate/_0
    c/replicate/_0 = Const @/job:worker/replica:0/task:0/device:CPU:0 <- ^init
    c/replicate/_1 = Const @/job:worker/replica:0/task:1/device:CPU:0 <- ^init
    ");
}

#[test]
fn large_constant_skipped_and_recorded() {
    let mut graph = Graph::new();
    let d = spread_constant(&mut graph, "d", &[4, 5]);

    let report = run(&mut graph).unwrap();

    assert!(graph.contains(d));
    assert_eq!(report.replicas_created(), 0);
    assert_eq!(
        report.skipped_oversized,
        Some(SkippedRange { min: 20, max: 20 })
    );
}

#[test]
fn threshold_boundary() {
    let mut graph = Graph::new();
    let at = spread_constant(&mut graph, "at", &[16]);
    let over = spread_constant(&mut graph, "over", &[17]);

    let report = run(&mut graph).unwrap();

    assert!(!graph.contains(at));
    assert!(graph.contains(over));
    assert_eq!(report.replications[0].original, "at");
    assert_eq!(
        report.skipped_oversized,
        Some(SkippedRange { min: 17, max: 17 })
    );
}

#[test]
fn single_consumer_never_replicated() {
    let mut graph = Graph::new();
    let c = constant(&mut graph, "c", &[2], T0_CPU);
    let a = op(&mut graph, "a", "Add", T1_CPU);
    graph.add_data_edge(c, 0, a, 0).unwrap();

    let before = render(&graph);
    let report = run(&mut graph).unwrap();
    assert_eq!(render(&graph), before);
    assert_eq!(report.skipped.few_consumers, 1);
}

#[test]
fn control_out_never_replicated() {
    let mut graph = Graph::new();
    let c = spread_constant(&mut graph, "c", &[2]);
    let sink = op(&mut graph, "sink", "NoOp", T2_GPU);
    graph.add_control_edge(c, sink).unwrap();

    let before = render(&graph);
    let report = run(&mut graph).unwrap();
    assert_eq!(render(&graph), before);
    assert_eq!(report.skipped.control_out, 1);
}

#[test]
fn consumers_on_one_host_not_replicated() {
    let mut graph = Graph::new();
    let c = constant(&mut graph, "c", &[2], T1_CPU);
    // CPU:0 and CPU:1 of task 1 resolve to the same host CPU.
    let a = op(&mut graph, "a", "Add", T1_CPU);
    let b = op(&mut graph, "b", "Add", T1_CPU1);
    graph.add_data_edge(c, 0, a, 0).unwrap();
    graph.add_data_edge(c, 0, b, 0).unwrap();

    let report = run(&mut graph).unwrap();
    assert!(graph.contains(c));
    assert_eq!(report.skipped.single_device, 1);
}

#[test]
fn malformed_consumer_device_aborts_without_rollback() {
    let mut graph = Graph::new();
    let first = spread_constant(&mut graph, "first", &[1]);
    let e = constant(&mut graph, "e", &[1], T0_CPU);
    let good = op(&mut graph, "good", "Add", T0_CPU);
    let bad = op(&mut graph, "bad", "Add", "/job:worker/task:zero");
    graph.add_data_edge(e, 0, good, 0).unwrap();
    graph.add_data_edge(e, 0, bad, 0).unwrap();

    let err = run(&mut graph).unwrap_err();
    assert!(matches!(
        err,
        PassError::MalformedDeviceName { ref node, .. } if node == "bad"
    ));

    // The earlier constant stays rewritten; `e` is untouched.
    assert!(!graph.contains(first));
    assert!(graph.find("first/replicate/_0").is_some());
    assert!(graph.contains(e));
    assert_eq!(graph.out_degree(e).unwrap(), 2);
    assert!(graph.find("e/replicate/_2").is_none());
}

#[test]
fn unassigned_consumer_aborts() {
    let mut graph = Graph::new();
    let c = constant(&mut graph, "c", &[1], T0_CPU);
    let a = op(&mut graph, "a", "Add", T0_CPU);
    let b = graph.add_node(Node::op("b", "Add")).unwrap();
    graph.add_data_edge(c, 0, a, 0).unwrap();
    graph.add_data_edge(c, 0, b, 0).unwrap();

    assert!(matches!(
        run(&mut graph),
        Err(PassError::NoAssignedDevice { node }) if node == "b"
    ));
}

#[test]
fn multi_output_ports_follow_replica() {
    let mut graph = Graph::new();
    let c = constant(&mut graph, "c", &[3], T0_CPU);
    let a = op(&mut graph, "a", "Concat", T0_GPU);
    let b = op(&mut graph, "b", "Concat", T1_CPU);
    graph.add_data_edge(c, 0, a, 0).unwrap();
    graph.add_data_edge(c, 0, a, 1).unwrap();
    graph.add_data_edge(c, 0, b, 0).unwrap();

    run(&mut graph).unwrap();

    // The GPU consumer on task 0 is fed by task 0's host CPU replica.
    let r0 = graph.require("c/replicate/_0").unwrap();
    assert_eq!(
        graph.node(r0).unwrap().assigned_device.as_deref(),
        Some(T0_CPU)
    );
    let into_a: Vec<(NodeId, Option<(u32, u32)>)> = graph
        .in_edges(a)
        .unwrap()
        .iter()
        .map(|e| (e.source, e.edge.ports()))
        .collect();
    assert_eq!(into_a, vec![(r0, Some((0, 0))), (r0, Some((0, 1)))]);
}

#[test]
fn replicas_in_json_roundtrip() {
    let json = format!(
        r#"{{"nodes": [
            {{"name": "k", "op": "Const", "device": "{cpu0}",
              "attrs": {{"value": {{"tensor": {{"dtype": "I32", "shape": {{"dims": [2]}}}}}}}}}},
            {{"name": "u", "op": "Add", "device": "{cpu0}", "inputs": ["k"]}},
            {{"name": "v", "op": "Add", "device": "{cpu1}", "inputs": ["k"]}}
        ]}}"#,
        cpu0 = T0_CPU,
        cpu1 = T1_CPU
    );
    let def = constrep_core::GraphDef::from_json(&json).unwrap();
    let mut graph = Graph::from_graph_def(&def).unwrap();

    run(&mut graph).unwrap();

    let out = graph.to_graph_def().unwrap();
    let names: Vec<&str> = out.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["u", "v", "k/replicate/_0", "k/replicate/_1"]);
    assert_eq!(out.nodes[1].inputs, vec!["k/replicate/_1".to_string()]);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

const DEVICES: [&str; 5] = [T0_CPU, T0_GPU, T1_CPU, T1_CPU1, T2_GPU];

/// Shape of a random placed graph: constants on CPUs feeding consumers.
#[derive(Debug, Clone)]
struct Layout {
    /// (element count, device index) per constant.
    constants: Vec<(i64, usize)>,
    /// Device index per consumer.
    consumers: Vec<usize>,
    /// (constant, consumer) data edges.
    edges: Vec<(usize, usize)>,
    /// Constants receiving a control edge from `init`.
    ordered_after_init: Vec<usize>,
}

fn arb_layout() -> impl Strategy<Value = Layout> {
    (1usize..5, 1usize..6).prop_flat_map(|(nc, nk)| {
        (
            proptest::collection::vec((1i64..=20, prop_oneof![Just(0usize), Just(2), Just(3)]), nc),
            proptest::collection::vec(0..DEVICES.len(), nk),
            proptest::collection::vec((0..nc, 0..nk), 0..14),
            proptest::collection::vec(0..nc, 0..4),
        )
            .prop_map(|(constants, consumers, edges, ordered_after_init)| Layout {
                constants,
                consumers,
                edges,
                ordered_after_init,
            })
    })
}

fn build(layout: &Layout) -> Graph {
    let mut graph = Graph::new();
    let init = op(&mut graph, "init", "NoOp", T0_CPU);
    let consts: Vec<NodeId> = layout
        .constants
        .iter()
        .enumerate()
        .map(|(i, &(n, d))| constant(&mut graph, &format!("c{}", i), &[n], DEVICES[d]))
        .collect();
    let consumers: Vec<NodeId> = layout
        .consumers
        .iter()
        .enumerate()
        .map(|(j, &d)| op(&mut graph, &format!("k{}", j), "AddN", DEVICES[d]))
        .collect();

    let mut next_port = vec![0u32; consumers.len()];
    for &(ci, kj) in &layout.edges {
        graph
            .add_data_edge(consts[ci], 0, consumers[kj], next_port[kj])
            .unwrap();
        next_port[kj] += 1;
    }
    for &ci in &layout.ordered_after_init {
        graph.add_control_edge(init, consts[ci]).unwrap();
    }
    graph
}

/// (consumer name, port) -> producer name.
fn data_inputs(graph: &Graph) -> HashMap<(String, u32), String> {
    graph
        .edges()
        .into_iter()
        .filter_map(|e| match e.edge {
            GraphEdge::Data { target_port, .. } => Some((
                (graph.node(e.target).unwrap().name.clone(), target_port),
                graph.node(e.source).unwrap().name.clone(),
            )),
            GraphEdge::Control => None,
        })
        .collect()
}

proptest! {
    #[test]
    fn second_run_changes_nothing(layout in arb_layout()) {
        let mut graph = build(&layout);
        ReplicateConstantsPass::default().run_on(&mut graph).unwrap();
        let once = graph.to_graph_def().unwrap();

        let report = ReplicateConstantsPass::default().run_on(&mut graph).unwrap();
        prop_assert_eq!(report.replicas_created(), 0);
        prop_assert_eq!(graph.to_graph_def().unwrap(), once);
    }

    #[test]
    fn every_consumer_input_fed_by_local_copy(layout in arb_layout()) {
        let mut graph = build(&layout);
        let before = data_inputs(&graph);
        let data_edges = graph.data_edge_count();

        let report = ReplicateConstantsPass::default().run_on(&mut graph).unwrap();
        let replicated: HashSet<&str> =
            report.replications.iter().map(|r| r.original.as_str()).collect();

        prop_assert_eq!(graph.data_edge_count(), data_edges);
        let after = data_inputs(&graph);
        prop_assert_eq!(after.len(), before.len());
        for (input, producer) in &before {
            let now = &after[input];
            if replicated.contains(producer.as_str()) {
                let prefix = format!("{}/replicate/_", producer);
                prop_assert!(now.starts_with(&prefix), "{} not a replica of {}", now, producer);
                let replica = graph.node(graph.require(now).unwrap()).unwrap();
                let consumer = graph.node(graph.require(&input.0).unwrap()).unwrap();
                let host = device_name_to_cpu_device_name(consumer.assigned_device().unwrap()).unwrap();
                prop_assert_eq!(replica.assigned_device(), Some(host.as_str()));
            } else {
                prop_assert_eq!(now, producer);
            }
        }
    }

    #[test]
    fn each_replica_ordered_after_every_predecessor(layout in arb_layout()) {
        let mut graph = build(&layout);
        let init = graph.require("init").unwrap();
        let report = ReplicateConstantsPass::default().run_on(&mut graph).unwrap();

        for replication in &report.replications {
            let index: usize = replication.original[1..].parse().unwrap();
            let k = layout.ordered_after_init.iter().filter(|&&c| c == index).count();
            for replica in &replication.replicas {
                let id = graph.require(&replica.name).unwrap();
                let preds = graph.in_edges(id).unwrap();
                prop_assert_eq!(preds.len(), k);
                prop_assert!(preds.iter().all(|e| e.is_control() && e.source == init));
            }
        }
        let init_out = graph.out_degree(init).unwrap();
        let expected: usize = layout
            .ordered_after_init
            .iter()
            .map(|&c| {
                report
                    .replications
                    .iter()
                    .find(|r| r.original == format!("c{}", c))
                    .map_or(1, |r| r.replicas.len())
            })
            .sum();
        prop_assert_eq!(init_out, expected);
    }

    #[test]
    fn node_names_stay_unique(layout in arb_layout()) {
        let mut graph = build(&layout);
        ReplicateConstantsPass::default().run_on(&mut graph).unwrap();
        let names: HashSet<String> = graph.nodes().map(|(_, n)| n.name.clone()).collect();
        prop_assert_eq!(names.len(), graph.node_count());
    }
}
