//! Shared fixtures for migrator tests

use std::sync::Arc;

use process_graph::{
    ExecutionPointer, GraphBuilder, GraphRepository, GraphStore, ProcessExecution, ProcessGraph,
};

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn order_v1() -> ProcessGraph {
    GraphBuilder::new("order")
        .start("start")
        .state("A")
        .state("B")
        .fork("fork")
        .process_state("call-billing", "billing")
        .super_state("review", |s| s.state("draft"))
        .end("end")
        .build()
}

/// `A` and `B` became `first` and `second`, `review` gained a task
pub(crate) fn order_v2() -> ProcessGraph {
    GraphBuilder::new("order")
        .start("start")
        .state("first")
        .state("second")
        .fork("fork")
        .process_state("call-billing", "billing")
        .super_state("review", |s| s.state("draft").task("approve"))
        .decision("route")
        .end("end")
        .build()
}

pub(crate) fn billing_v1() -> ProcessGraph {
    GraphBuilder::new("billing")
        .start("start")
        .state("invoice")
        .end("end")
        .build()
}

/// `invoice` became `invoice-sent`
pub(crate) fn billing_v2() -> ProcessGraph {
    GraphBuilder::new("billing")
        .start("start")
        .state("invoice-sent")
        .end("end")
        .build()
}

/// Store with `order` and `billing` deployed at versions 1 and 2
pub(crate) fn deployed_store() -> Arc<GraphStore> {
    init_logging();
    let store = GraphStore::new();
    for graph in [order_v1(), order_v2(), billing_v1(), billing_v2()] {
        store.deploy(graph).unwrap();
    }
    Arc::new(store)
}

pub(crate) fn repository(store: &Arc<GraphStore>) -> Arc<dyn GraphRepository> {
    store.clone()
}

pub(crate) fn order_execution(version: u32, root: ExecutionPointer) -> ProcessExecution {
    ProcessExecution::new("order", version, root.node.clone()).with_root(root)
}

pub(crate) fn billing_execution(version: u32, node: &str) -> ProcessExecution {
    ProcessExecution::new("billing", version, node)
}
