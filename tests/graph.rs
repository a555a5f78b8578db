use anyhow::Result;

use strata::prelude::*;

mod framework;

struct Resources {
    registry: ResourceRegistry,
    shadow: ResourceId,
    scene: ResourceId,
    final_color: ResourceId,
}

fn resources() -> Result<Resources> {
    let mut registry = ResourceRegistry::new(framework::extent(framework::WIDTH, framework::HEIGHT), 2);
    let shadow = registry.register(framework::depth_image("shadow_map"))?;
    let scene = registry.register(framework::color_image("scene_color"))?;
    let final_color = registry.register(framework::color_image("final_color"))?;
    Ok(Resources {
        registry,
        shadow,
        scene,
        final_color,
    })
}

fn writes(resource: ResourceId, version: u32) -> Result<DependencyDeclaration> {
    DependencyBuilder::new()
        .add_image_dependency(resource, Usage::Write, version, ClearPolicy::Clear)?
        .build()
}

#[test]
fn producer_runs_before_consumer() -> Result<()> {
    let res = resources()?;
    let shadow = writes(res.shadow, 0)?;
    let lighting = DependencyBuilder::new()
        .add_image_dependency(res.shadow, Usage::Read, 1, ClearPolicy::DontCare)?
        .add_image_dependency(res.scene, Usage::Write, 0, ClearPolicy::Clear)?
        .build()?;
    let tonemap = DependencyBuilder::new()
        .add_image_dependency(res.scene, Usage::Read, 1, ClearPolicy::DontCare)?
        .add_image_dependency(res.final_color, Usage::Write, 0, ClearPolicy::Clear)?
        .build()?;

    let graph = FrameGraph::build([("shadow", &shadow), ("lighting", &lighting), ("tonemap", &tonemap)])?;
    assert_eq!(graph.schedule_names(), ["shadow", "lighting", "tonemap"]);
    assert_eq!(graph.num_passes(), 3);
    assert_eq!(graph.num_edges(), 2);
    assert!(graph.has_edge(0, 1));
    assert!(graph.has_edge(1, 2));
    assert!(!graph.has_edge(0, 2));
    assert!(graph.unmatched_reads().is_empty());

    // Declaration order does not matter for connected passes
    let graph = FrameGraph::build([("tonemap", &tonemap), ("lighting", &lighting), ("shadow", &shadow)])?;
    assert_eq!(graph.schedule_names(), ["shadow", "lighting", "tonemap"]);
    Ok(())
}

#[test]
fn independent_passes_keep_declaration_order() -> Result<()> {
    let res = resources()?;
    let x = writes(res.scene, 0)?;
    let y = writes(res.final_color, 0)?;

    let graph = FrameGraph::build([("x", &x), ("y", &y)])?;
    assert_eq!(graph.schedule_names(), ["x", "y"]);
    assert_eq!(graph.num_edges(), 0);
    assert!(graph.is_isolated(0));
    assert!(graph.is_isolated(1));

    let graph = FrameGraph::build([("y", &y), ("x", &x)])?;
    assert_eq!(graph.schedule_names(), ["y", "x"]);
    Ok(())
}

#[test]
fn read_without_producer_adds_no_edge() -> Result<()> {
    let res = resources()?;
    let writer = writes(res.scene, 0)?;
    let reader = DependencyBuilder::new()
        .add_image_dependency(res.scene, Usage::Read, 2, ClearPolicy::DontCare)?
        .build()?;

    let graph = FrameGraph::build([("z", &reader), ("writer", &writer)])?;
    assert_eq!(graph.num_edges(), 0);
    assert_eq!(graph.schedule_names(), ["z", "writer"]);
    assert_eq!(
        graph.unmatched_reads(),
        [UnmatchedRead {
            pass: 0,
            resource: res.scene,
            version: 2,
        }]
    );
    Ok(())
}

#[test]
fn cycle_is_detected() -> Result<()> {
    let res = resources()?;
    let a = DependencyBuilder::new()
        .add_image_dependency(res.scene, Usage::Read, 1, ClearPolicy::DontCare)?
        .add_image_dependency(res.final_color, Usage::Write, 0, ClearPolicy::Clear)?
        .build()?;
    let b = DependencyBuilder::new()
        .add_image_dependency(res.final_color, Usage::Read, 1, ClearPolicy::DontCare)?
        .add_image_dependency(res.scene, Usage::Write, 0, ClearPolicy::Clear)?
        .build()?;
    let unrelated = writes(res.shadow, 0)?;

    let err = FrameGraph::build([("a", &a), ("b", &b), ("unrelated", &unrelated)]).unwrap_err();
    match err.downcast_ref::<Error>() {
        Some(Error::GraphHasCycle(passes)) => assert_eq!(passes, &["a".to_owned(), "b".to_owned()]),
        other => panic!("expected a cycle error, got {:?}", other),
    }
    Ok(())
}

#[test]
fn edges_between_the_same_passes_are_merged() -> Result<()> {
    let res = resources()?;
    let producer = DependencyBuilder::new()
        .add_image_dependency(res.scene, Usage::Write, 0, ClearPolicy::Clear)?
        .add_image_dependency(res.final_color, Usage::Write, 0, ClearPolicy::Clear)?
        .build()?;
    let consumer = DependencyBuilder::new()
        .add_image_dependency(res.scene, Usage::Read, 1, ClearPolicy::DontCare)?
        .add_image_dependency(res.final_color, Usage::Read, 1, ClearPolicy::DontCare)?
        .build()?;

    let graph = FrameGraph::build([("producer", &producer), ("consumer", &consumer)])?;
    assert_eq!(graph.num_edges(), 1);
    let (from, to, edge) = graph.edges().next().unwrap();
    assert_eq!((from, to), (0, 1));
    assert_eq!(edge.resources, vec![(res.scene, 1), (res.final_color, 1)]);
    Ok(())
}

#[test]
fn last_declared_writer_wins() -> Result<()> {
    let res = resources()?;
    let first = writes(res.scene, 0)?;
    let second = writes(res.scene, 0)?;
    let reader = DependencyBuilder::new()
        .add_image_dependency(res.scene, Usage::Read, 1, ClearPolicy::DontCare)?
        .build()?;

    let graph = FrameGraph::build([("first", &first), ("second", &second), ("reader", &reader)])?;
    assert!(graph.has_edge(1, 2));
    assert!(!graph.has_edge(0, 2));
    assert_eq!(graph.schedule_names(), ["second", "reader", "first"]);
    Ok(())
}

#[test]
fn combined_usage_chains_versions() -> Result<()> {
    let res = resources()?;
    let write = writes(res.scene, 0)?;
    let blur = DependencyBuilder::new()
        .add_image_dependency(res.scene, Usage::Combined, 1, ClearPolicy::DontCare)?
        .add_shader(ShaderStage::Compute, "blur.comp")
        .build()?;
    let sample = DependencyBuilder::new()
        .add_image_dependency(res.scene, Usage::Read, 2, ClearPolicy::DontCare)?
        .build()?;

    let graph = FrameGraph::build([("sample", &sample), ("blur", &blur), ("write", &write)])?;
    assert_eq!(graph.schedule_names(), ["write", "blur", "sample"]);
    Ok(())
}

#[test]
fn schedule_is_deterministic() -> Result<()> {
    let res = resources()?;
    let shadow = writes(res.shadow, 0)?;
    let a = writes(res.scene, 0)?;
    let b = DependencyBuilder::new()
        .add_image_dependency(res.shadow, Usage::Read, 1, ClearPolicy::DontCare)?
        .add_image_dependency(res.scene, Usage::Read, 1, ClearPolicy::DontCare)?
        .add_image_dependency(res.final_color, Usage::Write, 0, ClearPolicy::Clear)?
        .build()?;
    let passes = [("b", &b), ("a", &a), ("shadow", &shadow)];

    let first = FrameGraph::build(passes)?;
    // Both producers have rank zero, so they keep their relative declaration order.
    assert_eq!(first.schedule_names(), ["a", "shadow", "b"]);
    for _ in 0..16 {
        let graph = FrameGraph::build(passes)?;
        assert_eq!(graph.schedule(), first.schedule());
    }
    Ok(())
}

#[test]
fn schedule_respects_every_edge() -> Result<()> {
    let res = resources()?;
    let mut registry = res.registry;
    let chain = (0..6)
        .map(|i| registry.register(framework::color_image(&format!("chain_{}", i))))
        .collect::<Result<Vec<_>>>()?;
    // Pass i reads chain[i - 1] and writes chain[i]. Declared in reverse.
    let declarations = (0..6)
        .map(|i| {
            let mut builder = DependencyBuilder::new();
            if i > 0 {
                builder = builder.add_image_dependency(chain[i - 1], Usage::Read, 1, ClearPolicy::DontCare)?;
            }
            builder
                .add_image_dependency(chain[i], Usage::Write, 0, ClearPolicy::Clear)?
                .build()
        })
        .collect::<Result<Vec<_>>>()?;
    let names = (0..6).map(|i| format!("pass_{}", i)).collect::<Vec<_>>();
    let passes = (0..6).rev().map(|i| (names[i].as_str(), &declarations[i]));

    let graph = FrameGraph::build(passes)?;
    let position = |index: usize| graph.schedule().iter().position(|&i| i == index).unwrap();
    for (producer, consumer, _) in graph.edges() {
        assert!(position(producer) < position(consumer));
    }
    assert_eq!(graph.schedule_names(), ["pass_0", "pass_1", "pass_2", "pass_3", "pass_4", "pass_5"]);
    Ok(())
}

#[test]
fn export_dot() -> Result<()> {
    let res = resources()?;
    let shadow = writes(res.shadow, 0)?;
    let lighting = DependencyBuilder::new()
        .add_image_dependency(res.shadow, Usage::Read, 1, ClearPolicy::DontCare)?
        .build()?;

    let graph = FrameGraph::build([("shadow", &shadow), ("lighting", &lighting)])?;
    let dot = graph.dot()?;
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("Pass: shadow"));
    assert!(dot.contains("Pass: lighting"));
    assert!(dot.contains(&format!("{}@v1", res.shadow.index())));
    Ok(())
}
