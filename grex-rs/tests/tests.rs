use flate2::write::ZlibEncoder;
use flate2::Compression;
use grex_rs::detection::{DescriptorInfo, Signature};
use grex_rs::reconcile::{DeclaredSpan, NameHash, NameNode, NameTree, ParentRef};
use grex_rs::{
    ChunkedResource, DetectionEngine, EngineConfig, Entry, ExtensionSniffPass, FormatDescriptor,
    GrexError, HashRenamePass, NameDictionary, Probe, Reconciler, Resource, Source, VolumeSet,
};
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

/// A line based container: `TREE` then one `parent name` line per directory node,
/// with `-` as the parent of top level nodes.
struct TreeDescriptor;

const TREE_INFO: DescriptorInfo = DescriptorInfo {
    name: "tree",
    extensions: &["tree"],
    signatures: &[Signature {
        offset: 0,
        magic: b"TREE",
    }],
    file_types: &[],
};

impl FormatDescriptor for TreeDescriptor {
    fn info(&self) -> &DescriptorInfo {
        &TREE_INFO
    }

    fn score(&self, probe: &Probe) -> Result<u32, GrexError> {
        let mut magic = [0u8; 4];
        let read = probe.source().open()?.read(&mut magic)?;
        Ok(if read == 4 && &magic == b"TREE" { 75 } else { 0 })
    }

    fn parse_directory(&self, probe: &Probe) -> Result<Vec<Entry>, GrexError> {
        let mut text = String::new();
        probe.source().open()?.read_to_string(&mut text)?;
        let nodes = text
            .lines()
            .skip(1)
            .map(|line| {
                let (parent, name) = line
                    .split_once(' ')
                    .ok_or_else(|| GrexError::InvalidData(line.to_string()))?;
                let parent = match parent {
                    "-" => ParentRef::Root,
                    index => ParentRef::Index(
                        index
                            .parse()
                            .map_err(|_| GrexError::InvalidData(line.to_string()))?,
                    ),
                };
                Ok(NameNode::new(name, parent))
            })
            .collect::<Result<Vec<_>, GrexError>>()?;
        let paths = NameTree::new(nodes).with_limits(probe.limits()).paths()?;
        Ok(paths
            .into_iter()
            .map(|path| Resource::new(probe.source().clone(), path, 0, 0).into())
            .collect())
    }
}

/// Builds a Quake PACK file holding `files` in order.
fn build_pak(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut data = Vec::new();
    let mut directory = Vec::new();
    for (name, content) in files {
        let mut field = [0u8; 56];
        field[..name.len()].copy_from_slice(name.as_bytes());
        directory.extend_from_slice(&field);
        directory.extend_from_slice(&((12 + data.len()) as i32).to_le_bytes());
        directory.extend_from_slice(&(content.len() as i32).to_le_bytes());
        data.extend_from_slice(content);
    }
    let mut pak = b"PACK".to_vec();
    pak.extend_from_slice(&((12 + data.len()) as i32).to_le_bytes());
    pak.extend_from_slice(&(directory.len() as i32).to_le_bytes());
    pak.extend_from_slice(&data);
    pak.extend_from_slice(&directory);
    pak
}

/// Builds a BLTE blob with one zlib frame per chunk of `content`.
fn build_blte(content: &[u8], frame_size: usize) -> Vec<u8> {
    let frames: Vec<(Vec<u8>, usize)> = content
        .chunks(frame_size)
        .map(|chunk| {
            let mut encoder = ZlibEncoder::new(vec![b'Z'], Compression::best());
            encoder.write_all(chunk).unwrap();
            (encoder.finish().unwrap(), chunk.len())
        })
        .collect();

    let mut blte = b"BLTE".to_vec();
    blte.extend_from_slice(&(12 + 24 * frames.len() as u32).to_be_bytes());
    blte.push(0x0F);
    blte.extend_from_slice(&(frames.len() as u32).to_be_bytes()[1..]);
    for (frame, decoded) in &frames {
        blte.extend_from_slice(&(frame.len() as u32).to_be_bytes());
        blte.extend_from_slice(&(*decoded as u32).to_be_bytes());
        blte.extend_from_slice(&[0u8; 16]);
    }
    for (frame, _) in &frames {
        blte.extend_from_slice(frame);
    }
    blte
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_detect_and_extract_pak() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "pak0.pak",
        &build_pak(&[
            ("gfx/palette.lmp", &[1u8, 2, 3][..]),
            ("maps/start.bsp", &b"IBSP map data"[..]),
        ]),
    );

    let engine = DetectionEngine::default();
    let archive = engine.open_path(&path).unwrap();
    assert_eq!(archive.format().name, "Quake PAK");
    assert_eq!(archive.len(), 2);
    assert_eq!(archive.extract("GFX\\Palette.lmp").unwrap(), [1, 2, 3]);

    let entry = archive.find("maps/start.bsp").unwrap();
    assert_eq!(archive.file_type(entry), Some("Map"));

    // Extraction is idempotent.
    assert_eq!(entry.extract().unwrap(), entry.extract().unwrap());

    let report = archive.extract_to(dir.path().join("out")).unwrap();
    assert!(report.is_complete());
    assert_eq!(
        fs::read(dir.path().join("out/maps/start.bsp")).unwrap(),
        b"IBSP map data"
    );
}

#[test]
fn test_truncated_container_fails_per_entry() {
    let dir = tempfile::tempdir().unwrap();
    let pak = build_pak(&[("first.txt", &b"one"[..]), ("second.txt", &b"two two"[..])]);
    let path = write(dir.path(), "pak1.pak", &pak);

    let engine = DetectionEngine::default();
    let archive = engine.open_path(&path).unwrap();

    // Cut the container inside the second file after the directory was parsed.
    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(12 + 3 + 2)
        .unwrap();

    let report = archive.extract_each(|_, _| Ok(()));
    assert_eq!(report.extracted, ["first.txt"]);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(
        report.failed[0].1,
        GrexError::Truncated { size: 17, .. }
    ));
}

#[test]
fn test_nested_blte_inside_pak() {
    let mut content = b"OggS".to_vec();
    content.extend((0..5000u32).map(|i| (i % 251) as u8));
    let blte = build_blte(&content, 1024);
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "pak2.pak", &build_pak(&[("music/theme.blte", blte.as_slice())]));

    let engine = DetectionEngine::default();
    let outer = engine.open_path(&path).unwrap();
    let inner_entry = outer.find("music/theme.blte").unwrap();

    let probe = Probe::new(Source::from_entry(inner_entry).unwrap(), "theme.blte").unwrap();
    let best = engine.detect(&probe).unwrap();
    assert_eq!(best.descriptor.info().name, "BLTE");

    let mut inner = engine.open(probe).unwrap();
    assert_eq!(inner.entries()[0].name(), "theme.dat");
    assert_eq!(inner.entries()[0].extract().unwrap(), content);

    let mut reconciler = Reconciler::new();
    reconciler.push(ExtensionSniffPass::new());
    assert_eq!(inner.reconcile(&reconciler).unwrap(), 1);
    assert_eq!(inner.entries()[0].name(), "theme.ogg");
    assert_eq!(inner.entries()[0].original_name(), "theme.dat");
}

#[test]
fn test_unknown_and_empty_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let engine = DetectionEngine::default();

    let empty = write(dir.path(), "empty.pak", b"");
    assert!(matches!(
        engine.open_path(&empty),
        Err(GrexError::NoMatchingFormat(_))
    ));

    // The extension alone is not enough.
    let text = write(dir.path(), "readme.pak", b"just some text");
    let probe = Probe::from_path(&text).unwrap();
    assert!(engine.best_matches(&probe, 3).is_empty());

    assert!(matches!(
        engine.open_path(dir.path().join("missing.pak")),
        Err(GrexError::FileNotFound(_))
    ));
}

#[test]
fn test_config_file_limits_entry_count() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write(
        dir.path(),
        "grex.conf",
        b"# strict\nmax-entry-count = 1\nparallel-scoring = true\n",
    );
    let config = EngineConfig::load(&config_path).unwrap();
    let engine = DetectionEngine::with_builtin_descriptors(config);

    let path = write(
        dir.path(),
        "pak3.pak",
        &build_pak(&[("a.cfg", &b"a"[..]), ("b.cfg", &b"b"[..])]),
    );
    match engine.open_path(&path) {
        Err(GrexError::ParseFailed { format, reason }) => {
            assert_eq!(format, "Quake PAK");
            assert!(matches!(*reason, GrexError::ConstraintViolation(_)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_hash_dictionary_renames_entries() {
    let dir = tempfile::tempdir().unwrap();
    let names = write(dir.path(), "names.txt", b"# known\nsound/boom.wav\n");
    let dictionary = NameDictionary::load(&names, NameHash::Crc32).unwrap();

    let source = Source::from_bytes(b"RIFF0000WAVE".to_vec());
    let hash = NameHash::Crc32.hash("sound/boom.wav");
    let mut entries: Vec<Entry> = vec![Resource::new(source, "file_00000.dat", 0, 12)
        .with_placeholder_name()
        .with_name_hash(hash)
        .into()];

    let mut reconciler = Reconciler::new();
    reconciler.push(HashRenamePass::new(dictionary));
    reconciler.run(&mut entries).unwrap();
    assert_eq!(entries[0].name(), "sound/boom.wav");
    assert!(entries[0].is_modified());
}

#[test]
fn test_split_volumes_rebase_into_chunks() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data.000", b"0123456789");
    write(dir.path(), "data.001", b"abcdefghij");

    let set = VolumeSet::discover(dir.path().join("data.000")).unwrap();
    assert_eq!(set.len(), 2);

    // Declared offsets live in one logical space; the third span repeats the first.
    let spans = [
        DeclaredSpan { offset: 0, length: 6 },
        DeclaredSpan { offset: 6, length: 4 },
        DeclaredSpan { offset: 0, length: 6 },
        DeclaredSpan { offset: 10, length: 5 },
    ];
    let placed = set.rebase(&spans, 1).unwrap();
    assert_eq!(placed[2].1, placed[0].1);
    assert_eq!(placed[3].1, 0);

    let chunked = ChunkedResource::from_chunks(
        "joined.bin",
        placed
            .iter()
            .zip(&spans)
            .map(|((source, offset), span)| {
                grex_rs::Chunk::new(source.clone(), *offset, span.length, span.length, None)
            })
            .collect(),
    )
    .unwrap();
    assert_eq!(chunked.extract().unwrap(), b"0123456789012345abcde");
}

#[test]
fn test_config_name_depth_reaches_descriptors() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "nested.tree", b"TREE\n- a\n0 b\n1 c\n");

    let mut engine = DetectionEngine::new(EngineConfig::default());
    engine.register(TreeDescriptor);
    let archive = engine.open_path(&path).unwrap();
    assert!(archive.find("a/b/c").is_some());

    let config = EngineConfig::parse(&b"max-name-depth = 2\n"[..]).unwrap();
    let mut engine = DetectionEngine::new(config);
    engine.register(TreeDescriptor);
    match engine.open_path(&path) {
        Err(GrexError::ParseFailed { format, reason }) => {
            assert_eq!(format, "tree");
            assert!(matches!(*reason, GrexError::ConstraintViolation(_)));
        }
        other => panic!("unexpected {other:?}"),
    }
}
