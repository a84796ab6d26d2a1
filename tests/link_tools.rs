/// Integration tests for the link rebuild tools.
///
/// Both tools clear the link table first, so every test imports notes, runs
/// one tool and checks what is left.
use anyhow::Result;
use mindtree::{Database, LinkType, ObsidianService, SourceFile, linker};

fn service_with(files: &[(&str, &str)]) -> Result<ObsidianService> {
    let service = ObsidianService::new(Database::in_memory()?);
    let files: Vec<SourceFile> = files
        .iter()
        .map(|(path, content)| SourceFile::new(*path, *content))
        .collect();
    service.import_from_files(&files, None)?;
    Ok(service)
}

fn strengths_of(service: &ObsidianService, link_type: LinkType) -> Result<Vec<f64>> {
    Ok(service
        .store()
        .list_links()?
        .into_iter()
        .filter(|l| l.link_type == link_type)
        .map(|l| l.strength)
        .collect())
}

#[test]
fn test_two_shared_tags_give_strength_point_four() -> Result<()> {
    let service = service_with(&[
        ("One.md", "# One\n#garden #water"),
        ("Two.md", "# Two\n#garden #water #solar"),
    ])?;

    linker::generate_links(service.store())?;

    assert_eq!(strengths_of(&service, LinkType::Tag)?, vec![0.4]);
    Ok(())
}

#[test]
fn test_many_shared_tags_cap_at_one() -> Result<()> {
    let tags = "#a1 #a2 #a3 #a4 #a5 #a6 #a7 #a8 #a9 #a10";
    let one = format!("# One\n{tags}");
    let two = format!("# Two\n{tags}");
    let service = service_with(&[("One.md", &one), ("Two.md", &two)])?;

    linker::generate_links(service.store())?;

    assert_eq!(strengths_of(&service, LinkType::Tag)?, vec![1.0]);
    Ok(())
}

#[test]
fn test_title_containment_creates_title_link() -> Result<()> {
    let service = service_with(&[
        ("Garden.md", "# Garden\nPlots."),
        ("Garden Budget.md", "# Garden Budget\nCosts."),
    ])?;

    let report = linker::generate_links(service.store())?;

    assert_eq!(report.title_similarity, 1);
    assert_eq!(strengths_of(&service, LinkType::TitleSimilarity)?, vec![0.2]);
    Ok(())
}

#[test]
fn test_inferred_links_stay_out_of_network_view() -> Result<()> {
    let service = service_with(&[
        ("Garden.md", "# Garden\nSee [[Garden Budget]]. #project"),
        ("Garden Budget.md", "# Garden Budget\n#project"),
    ])?;

    linker::generate_links(service.store())?;
    let network = service.get_network_data()?;

    assert_eq!(service.store().count_links()?, 3);
    assert_eq!(network.links.len(), 1);
    assert_eq!(network.links[0].link_type, LinkType::Wiki);
    Ok(())
}

#[test]
fn test_explicit_rebuild_drops_inferred_links() -> Result<()> {
    let service = service_with(&[
        ("A.md", "# Alpha\n[[B]] #project"),
        ("B.md", "# Beta\n#project"),
    ])?;
    linker::generate_links(service.store())?;
    assert_eq!(service.store().count_links()?, 2);

    let report = linker::extract_explicit_links(service.store())?;

    assert_eq!(report.removed, 2);
    assert_eq!(report.wiki, 1);
    assert_eq!(report.tag, 0);
    assert_eq!(service.store().count_links()?, 1);
    Ok(())
}

#[test]
fn test_explicit_rebuild_restores_canvas_edges() -> Result<()> {
    let canvas = r#"{
        "nodes": [
            {"id": "a", "type": "text", "text": "Start", "x": 0, "y": 0, "width": 100, "height": 50},
            {"id": "b", "type": "text", "text": "Finish", "x": 500, "y": 0, "width": 100, "height": 50}
        ],
        "edges": [{"id": "e", "fromNode": "a", "toNode": "b"}]
    }"#;
    let service = service_with(&[("Flow.canvas", canvas)])?;

    let report = linker::extract_explicit_links(service.store())?;

    assert_eq!(report.canvas_edge, 1);
    assert_eq!(report.unresolved, 0);
    assert_eq!(strengths_of(&service, LinkType::CanvasEdge)?, vec![1.0]);
    Ok(())
}

#[test]
fn test_unresolved_wiki_links_are_counted() -> Result<()> {
    let service = service_with(&[("A.md", "# Alpha\n[[Nowhere]] and [[B]]"), ("B.md", "# Beta")])?;

    let report = linker::extract_explicit_links(service.store())?;

    assert_eq!(report.wiki, 1);
    assert_eq!(report.unresolved, 1);
    Ok(())
}

#[test]
fn test_explicit_rebuild_resolves_titles_with_dots() -> Result<()> {
    let service = service_with(&[
        ("Visit.md", "# Visit\nCall [[Dr. Smith]] and [[v1.2 Notes]]."),
        ("Dr. Smith.md", "# Dr. Smith"),
        ("v1.2 Notes.md", "# v1.2 Notes"),
    ])?;

    let report = linker::extract_explicit_links(service.store())?;

    assert_eq!(report.wiki, 2);
    assert_eq!(report.unresolved, 0);
    Ok(())
}
