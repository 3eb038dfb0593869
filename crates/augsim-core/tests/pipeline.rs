//! End-to-end runs against files in temporary directories

use augsim_core::{
    read_table, AugmentConfig, CellValue, CombineRule, Completion, ErrorKind, Pipeline,
    PipelineEvent, RunRequest, Stage,
};
use std::fs;
use std::path::{Path, PathBuf};

const SIM_CSV: &str = "DTOBITO,IDADE,CODBAIRES,CAUSABAS\n\
                       15032020,465,08,I219\n\
                       01012021,311,99,X700\n";

fn pipeline() -> Pipeline {
    Pipeline::from_config(&AugmentConfig::default())
}

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// dBase III file with character (`C`) and numeric (`N`) fields
fn dbf(fields: &[(&str, u8, u8)], records: &[&[&str]]) -> Vec<u8> {
    let record_len: usize = 1 + fields.iter().map(|f| f.2 as usize).sum::<usize>();
    let header_len = 32 + fields.len() * 32 + 1;

    let mut out = vec![0u8; 32];
    out[0] = 0x03;
    out[1..4].copy_from_slice(&[121, 3, 15]);
    out[4..8].copy_from_slice(&(records.len() as u32).to_le_bytes());
    out[8..10].copy_from_slice(&(header_len as u16).to_le_bytes());
    out[10..12].copy_from_slice(&(record_len as u16).to_le_bytes());

    for (name, kind, len) in fields {
        let mut desc = [0u8; 32];
        desc[..name.len()].copy_from_slice(name.as_bytes());
        desc[11] = *kind;
        desc[16] = *len;
        out.extend_from_slice(&desc);
    }
    out.push(0x0D);

    for values in records {
        out.push(b' ');
        for ((_, kind, len), value) in fields.iter().zip(values.iter()) {
            let width = *len as usize;
            // Numbers are right-aligned, text left-aligned
            let cell = if *kind == b'N' {
                format!("{:>width$}", value)
            } else {
                format!("{:<width$}", value)
            };
            out.extend_from_slice(cell.as_bytes());
        }
    }
    out.push(0x1A);
    out
}

fn collect_events(pipeline: &Pipeline, request: &RunRequest) -> Vec<PipelineEvent> {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let _ = pipeline.run(request, &sender);
    drop(sender);
    receiver.iter().collect()
}

#[test]
fn test_sim_csv_is_augmented() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "DOSP2020.csv", SIM_CSV.as_bytes());
    let output = dir.path().join("augmented.json");

    let report = pipeline()
        .run(&RunRequest::new(vec![input], &output), &())
        .unwrap();
    assert_eq!(report.rows, 2);
    assert_eq!(report.columns, 31);

    let table = read_table(&output).unwrap();
    assert_eq!(
        &table.column_names()[..10],
        &[
            "DTOBITO",
            "DIA",
            "MES",
            "ANO",
            "ANOEPI",
            "SEMANAEPI",
            "IDADE",
            "IDADEGERAL",
            "IDADECAT1",
            "IDADECAT2"
        ]
    );

    let int = |row: usize, col: &str| table.cell(row, col).and_then(CellValue::as_i64);
    assert_eq!(int(0, "SEMANAEPI"), Some(12));
    assert_eq!(int(0, "IDADEGERAL"), Some(65));
    assert_eq!(int(0, "AREARENDA"), Some(1));
    assert_eq!(int(0, "CAPCID"), Some(9));
    assert_eq!(int(0, "DCOR"), Some(1));
    assert_eq!(table.cell(0, "CIDBR"), Some(&CellValue::text("068.1")));

    assert_eq!(int(1, "ANOEPI"), Some(2020));
    assert_eq!(int(1, "SEMANAEPI"), Some(53));
    assert_eq!(int(1, "IDADECAT1"), Some(1));
    assert_eq!(table.cell(1, "AREARENDA"), Some(&CellValue::Empty));
    assert_eq!(int(1, "SUIC"), Some(1));
}

#[test]
fn test_dec2020_dbf_is_normalized_and_augmented() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = dbf(
        &[
            ("ANO_OBITO", b'N', 4),
            ("MES_OBITO", b'N', 2),
            ("IDADE", b'N', 3),
            ("CD_GEOCODI", b'C', 15),
            ("CAUSABAS", b'C', 4),
        ],
        &[&["2020", "7", "65", "355030808000012", "I219"]],
    );
    let input = write_file(dir.path(), "DOSP2020.dbf", &bytes);
    let output = dir.path().join("out.json");

    pipeline()
        .run(&RunRequest::new(vec![input], &output), &())
        .unwrap();

    let table = read_table(&output).unwrap();
    assert_eq!(table.column_index("ANO_OBITO"), None);
    assert_eq!(table.cell(0, "ANO"), Some(&CellValue::Integer(2020)));
    assert_eq!(table.cell(0, "MES"), Some(&CellValue::Integer(7)));
    assert_eq!(table.cell(0, "IDADE"), Some(&CellValue::text("465")));
    assert_eq!(table.cell(0, "IDADEGERAL"), Some(&CellValue::Integer(65)));
    assert_eq!(table.cell(0, "CODBAIRES"), Some(&CellValue::text("08")));
    assert_eq!(table.cell(0, "AREARENDA"), Some(&CellValue::Integer(1)));
    assert_eq!(
        table.column_index("CODBAIRES"),
        table.column_index("CD_GEOCODI").map(|i| i + 1)
    );
}

#[test]
fn test_inputs_are_concatenated_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.csv", b"ID,NAME\n1,first\n");
    let b = write_file(dir.path(), "b.csv", b"ID,CITY\n2,Santos\n");
    let output = dir.path().join("out.csv");

    pipeline()
        .run(&RunRequest::new(vec![a, b], &output), &())
        .unwrap();

    let table = read_table(&output).unwrap();
    assert_eq!(table.column_names(), vec!["ID", "NAME", "CITY"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(1, "ID"), Some(&CellValue::Integer(2)));
    assert_eq!(table.cell(1, "NAME"), Some(&CellValue::Empty));
}

#[test]
fn test_merge_on_key() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.csv", b"NUMERODO,IDADE\n10,465\n11,470\n");
    let b = write_file(dir.path(), "b.csv", b"NUMERODO,CODBAIRES\n11,08\n");
    let output = dir.path().join("out.json");

    let config = AugmentConfig {
        combine: CombineRule::MergeOnKey {
            key: "NUMERODO".to_string(),
        },
        ..AugmentConfig::default()
    };
    Pipeline::from_config(&config)
        .run(&RunRequest::new(vec![a, b], &output), &())
        .unwrap();

    let table = read_table(&output).unwrap();
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(1, "AREARENDA"), Some(&CellValue::Integer(1)));
    assert_eq!(table.cell(0, "AREARENDA"), Some(&CellValue::Empty));
}

#[test]
fn test_pattern_selects_inputs() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "DOSP2019.csv", b"ID\n1\n");
    write_file(dir.path(), "DOSP2020.csv", b"ID\n2\n");
    write_file(dir.path(), "notes.csv", b"ID\n3\n");
    let output = dir.path().join("out.csv");

    let pattern = dir.path().join("DOSP*.csv");
    let request = RunRequest::new(vec![], &output).with_pattern(pattern.to_string_lossy());
    let report = pipeline().run(&request, &()).unwrap();

    assert_eq!(report.inputs.len(), 2);
    assert_eq!(report.rows, 2);
}

#[test]
fn test_read_failure_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_file(dir.path(), "a.csv", SIM_CSV.as_bytes());
    let bad = write_file(dir.path(), "b.dbf", b"definitely not a dbase file");
    let output = dir.path().join("out.csv");

    let failure = pipeline()
        .run(&RunRequest::new(vec![good, bad.clone()], &output), &())
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::InvalidOrUnsupportedContent);
    assert_eq!(failure.path(), Some(bad.as_path()));
    assert_eq!(
        failure.stage,
        Stage::Reading {
            index: 2,
            path: bad
        }
    );
    assert!(!output.exists());
}

#[test]
fn test_output_equal_to_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "a.csv", SIM_CSV.as_bytes());

    let failure = pipeline()
        .run(&RunRequest::new(vec![input.clone()], &input), &())
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::OutputIsInput);
    assert_eq!(failure.stage, Stage::Resolving);
    assert_eq!(fs::read_to_string(&input).unwrap(), SIM_CSV);
}

#[test]
fn test_unsupported_output_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "a.csv", SIM_CSV.as_bytes());
    let output = dir.path().join("out.dbf");

    let failure = pipeline()
        .run(&RunRequest::new(vec![input], &output), &())
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::UnsupportedOutputFormat);
    assert_eq!(failure.stage, Stage::Writing);
    assert!(!output.exists());
}

#[test]
fn test_output_directory_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "a.csv", SIM_CSV.as_bytes());
    let output = dir.path().join("out.csv");
    fs::create_dir(&output).unwrap();

    let failure = pipeline()
        .run(&RunRequest::new(vec![input], &output), &())
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::OutputIsDirectory);
}

#[test]
fn test_progress_is_monotonic_and_completes_last() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.csv", SIM_CSV.as_bytes());
    let b = write_file(dir.path(), "b.csv", SIM_CSV.as_bytes());
    let output = dir.path().join("out.csv");

    let events = collect_events(&pipeline(), &RunRequest::new(vec![a, b], &output));
    let overall: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Progress(state) => Some(state.overall),
            _ => None,
        })
        .collect();

    assert!(!overall.is_empty());
    assert!(overall.windows(2).all(|w| w[0] <= w[1]));
    let (last, rest) = overall.split_last().unwrap();
    assert_eq!(*last, 1.0);
    assert!(rest.iter().all(|&p| p < 1.0));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::Finished(Completion::Succeeded { .. }))
    ));
}

#[test]
fn test_failed_run_finishes_once() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.csv");
    let output = dir.path().join("out.csv");

    let events = collect_events(&pipeline(), &RunRequest::new(vec![missing.clone()], &output));
    let finished: Vec<&Completion> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Finished(c) => Some(c),
            _ => None,
        })
        .collect();

    assert_eq!(finished.len(), 1);
    match finished[0] {
        Completion::Failed { kind, path, .. } => {
            assert_eq!(*kind, ErrorKind::ReadIoFailure);
            assert_eq!(path.as_deref(), Some(missing.as_path()));
        }
        other => panic!("unexpected completion {:?}", other),
    }
    assert!(matches!(events.last(), Some(PipelineEvent::Finished(_))));
}

#[test]
fn test_runs_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "a.csv", SIM_CSV.as_bytes());
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");

    pipeline()
        .run(&RunRequest::new(vec![input.clone()], &first), &())
        .unwrap();
    pipeline()
        .run(&RunRequest::new(vec![input], &second), &())
        .unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_spawned_run_streams_events() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "a.csv", SIM_CSV.as_bytes());
    let output = dir.path().join("out.csv");

    let handle = pipeline().spawn(RunRequest::new(vec![input], &output));
    let events: Vec<PipelineEvent> = handle.events().iter().collect();
    let progress = handle.progress();
    let report = handle.wait().unwrap();

    assert_eq!(report.rows, 2);
    assert_eq!(progress.overall, 1.0);
    assert!(matches!(
        events.first(),
        Some(PipelineEvent::StageStarted(Stage::Resolving))
    ));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::Finished(Completion::Succeeded { rows: 2, .. }))
    ));
}

#[test]
fn test_cancelled_spawned_run_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let inputs: Vec<PathBuf> = (0..20)
        .map(|i| write_file(dir.path(), &format!("in{:02}.csv", i), SIM_CSV.as_bytes()))
        .collect();
    let output = dir.path().join("out.csv");

    let handle = pipeline().spawn(RunRequest::new(inputs, &output));
    handle.cancel();
    let finished = handle
        .events()
        .iter()
        .filter(|e| matches!(e, PipelineEvent::Finished(_)))
        .count();

    // The worker may already be past its last check when the flag is raised
    match handle.wait() {
        Ok(report) => assert_eq!(report.rows, 40),
        Err(failure) => {
            assert_eq!(failure.kind(), ErrorKind::Cancelled);
            assert!(!output.exists());
        }
    }
    assert_eq!(finished, 1);
}
