/*!
# Merge engine
Contains the core logic for joining the archaic variant stream against the modern variant stream.
The join is a one-pass, two-pointer sorted merge: the archaic stream drives the outer loop while a
persistent, monotonically advancing cursor walks the modern stream. Neither stream is ever rewound,
which keeps the whole merge O(A+M) but assumes both inputs are position-sorted.

Per archaic site the engine either emits a "private variant" row (archaic non-reference, position
absent from the modern file entirely) or scans the modern cursor forward for a position match with
compatible alleles. After a successful match the cursor stays on the matched record.

## Example usage
```rust
use gtmerge::data_types::records::{MergedRow, VariantRecord};
use gtmerge::merge_engine::{merge_streams, PositionPool};
use gtmerge::writers::RowSink;

/// Trivial sink that collects rows in memory
struct MemorySink(Vec<MergedRow>);
impl RowSink for MemorySink {
    fn write_header(&mut self, _archaic_sample: &str, _modern_samples: &[String]) -> anyhow::Result<()> {
        Ok(())
    }
    fn write_row(&mut self, row: &MergedRow) -> anyhow::Result<()> {
        self.0.push(row.clone());
        Ok(())
    }
}

// one archaic site that lines up with one modern site
let archaic = vec![
    VariantRecord::new("chr1".to_string(), 200, "G".to_string(), "C".to_string(), vec!["1/1".to_string()])
];
let modern = vec![
    VariantRecord::new("chr1".to_string(), 200, "G".to_string(), "C".to_string(), vec!["0/1".to_string()])
];

let pool = PositionPool::from_records(modern.iter().cloned().map(Ok)).unwrap();
let mut sink = MemorySink(vec![]);
let summary = merge_streams(
    archaic.into_iter().map(Ok), modern.into_iter().map(Ok), &pool, 1, &mut sink
).unwrap();

assert_eq!(summary.matched_rows(), 1);
assert_eq!(sink.0[0].archaic_count(), 2);
assert_eq!(sink.0[0].modern_counts(), &[1]);
```
*/
use rustc_hash::FxHashSet;
use std::iter::Peekable;

use crate::data_types::records::{encode_diploid, MergedRow, VariantRecord};
use crate::writers::RowSink;

/// An archaic ALT of "." matches any modern ALT; the modern ALT is authoritative in the output
pub const WILDCARD_ALT: &str = ".";

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum MergeError {
    #[error("chromosome mismatch between inputs: archaic file has {archaic:?}, modern file has {modern:?}")]
    ChromosomeMismatch { archaic: String, modern: String }
}

/// Set of every position present in the modern file, used only for membership tests.
/// Duplicate positions collapse, which is intended; the pool carries no allele information.
#[derive(Clone, Debug, Default)]
pub struct PositionPool {
    /// All modern positions
    positions: FxHashSet<u64>
}

impl PositionPool {
    /// Builds the pool with a single full pass over the modern record stream.
    /// Must run to completion before any merge step begins.
    /// # Errors
    /// * if the underlying stream yields a read or parse error
    pub fn from_records<M>(records: M) -> anyhow::Result<PositionPool>
    where
        M: Iterator<Item = anyhow::Result<VariantRecord>>
    {
        let mut positions: FxHashSet<u64> = Default::default();
        for record in records {
            positions.insert(record?.pos());
        }
        Ok(PositionPool {
            positions
        })
    }

    /// Returns true if any modern record sits at the given position
    pub fn contains(&self, pos: u64) -> bool {
        self.positions.contains(&pos)
    }

    /// Number of unique positions in the pool
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Verifies that both inputs describe the same chromosome, based on their first data records.
/// Either side being empty is tolerated; an empty modern file only disables the paired-scan path.
/// # Arguments
/// * `archaic_chrom` - chromosome of the first archaic data record
/// * `modern_chrom` - chromosome of the first modern data record, if any
/// # Errors
/// * if both chromosomes are present and disagree
pub fn ensure_same_chromosome(archaic_chrom: &str, modern_chrom: Option<&str>) -> Result<(), MergeError> {
    if let Some(modern) = modern_chrom {
        if modern != archaic_chrom {
            return Err(MergeError::ChromosomeMismatch {
                archaic: archaic_chrom.to_string(),
                modern: modern.to_string()
            });
        }
    }
    Ok(())
}

/// Counters describing one completed merge session
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MergeSummary {
    /// Total archaic records consumed
    archaic_records: u64,
    /// Archaic sites skipped because REF or ALT was not a single character
    non_snv_skipped: u64,
    /// Rows emitted through the private-variant short-circuit
    private_rows: u64,
    /// Rows emitted from a position match with compatible alleles
    matched_rows: u64,
    /// Archaic SNV sites that produced no output row
    unmatched_sites: u64
}

impl MergeSummary {
    // getters
    pub fn archaic_records(&self) -> u64 {
        self.archaic_records
    }

    pub fn non_snv_skipped(&self) -> u64 {
        self.non_snv_skipped
    }

    pub fn private_rows(&self) -> u64 {
        self.private_rows
    }

    pub fn matched_rows(&self) -> u64 {
        self.matched_rows
    }

    pub fn unmatched_sites(&self) -> u64 {
        self.unmatched_sites
    }

    /// Total number of rows handed to the sink
    pub fn rows_emitted(&self) -> u64 {
        self.private_rows + self.matched_rows
    }
}

/// What the paired scan decided to do with the record under the cursor
enum CursorAction {
    /// Consume the record; it can never match a later archaic site
    Advance,
    /// Leave the record in place for the next archaic site
    Stop
}

/// Non-rewinding cursor over the modern stream.
/// Stream errors are surfaced through `peek` so the engine can propagate them with `?`.
struct ModernCursor<M>
where
    M: Iterator<Item = anyhow::Result<VariantRecord>>
{
    iter: Peekable<M>
}

impl<M> ModernCursor<M>
where
    M: Iterator<Item = anyhow::Result<VariantRecord>>
{
    fn new(records: M) -> Self {
        Self {
            iter: records.peekable()
        }
    }

    /// Returns the record under the cursor without consuming it, or None once the stream is exhausted
    fn peek(&mut self) -> anyhow::Result<Option<&VariantRecord>> {
        // a stream error has to be taken out of the iterator before we can return it by value
        if let Some(Err(_)) = self.iter.peek() {
            if let Some(Err(e)) = self.iter.next() {
                return Err(e);
            }
        }
        match self.iter.peek() {
            Some(Ok(record)) => Ok(Some(record)),
            _ => Ok(None)
        }
    }

    /// Consumes the record under the cursor
    fn advance(&mut self) {
        self.iter.next();
    }
}

/// Entry point for merging the two variant streams into the sink.
/// The sink header must already be written; this function only emits data rows.
/// # Arguments
/// * `archaic` - the archaic record stream, position-sorted (assumed, not verified)
/// * `modern` - the modern record stream, position-sorted (assumed, not verified)
/// * `pool` - precomputed set of every modern position
/// * `modern_sample_count` - number of modern samples, used for the all-zero private rows
/// * `sink` - receives the merged rows in emission order
/// # Errors
/// * if either stream yields a read or parse error
/// * if the sink fails to serialize a row
pub fn merge_streams<A, M, S>(
    archaic: A,
    modern: M,
    pool: &PositionPool,
    modern_sample_count: usize,
    sink: &mut S
) -> anyhow::Result<MergeSummary>
where
    A: Iterator<Item = anyhow::Result<VariantRecord>>,
    M: Iterator<Item = anyhow::Result<VariantRecord>>,
    S: RowSink
{
    let mut summary = MergeSummary::default();
    let mut cursor = ModernCursor::new(modern);

    for record in archaic {
        let record = record?;
        summary.archaic_records += 1;

        // non-SNV sites produce no output row at all
        if !record.is_snv() {
            summary.non_snv_skipped += 1;
            continue;
        }

        // the archaic file carries exactly one genotype column; a missing token decodes to 0
        let archaic_count = encode_diploid(
            record.genotypes().first().map(|g| g.as_str()).unwrap_or("")
        );

        // private-variant short-circuit: archaic non-reference at a position the modern file
        // never mentions; emit an all-reference modern block and leave the cursor untouched
        if archaic_count != 0 && !pool.contains(record.pos()) {
            let row = MergedRow::new(
                record.chrom().to_string(),
                record.pos(),
                record.ref_allele().to_string(),
                record.alt_allele().to_string(),
                archaic_count,
                vec![0; modern_sample_count]
            );
            sink.write_row(&row)?;
            summary.private_rows += 1;
            continue;
        }

        // paired scan: walk the cursor forward, never backward
        let mut scan_result: Option<MergedRow> = None;
        loop {
            let action = match cursor.peek()? {
                // cursor exhausted; only the private path remains reachable for later records
                None => CursorAction::Stop,
                // this modern record can never match any future archaic site either
                Some(m) if m.pos() < record.pos() => CursorAction::Advance,
                // no match for this archaic site; the record stays put for the next one
                Some(m) if m.pos() > record.pos() => CursorAction::Stop,
                Some(m) => {
                    // position match; at most one modern record is considered per archaic site,
                    // and the cursor stays on the matched record afterwards
                    let compatible = m.is_snv()
                        && m.ref_allele() == record.ref_allele()
                        && (m.alt_allele() == record.alt_allele() || record.alt_allele() == WILDCARD_ALT);
                    if compatible {
                        let modern_counts: Vec<u8> = m.genotypes().iter()
                            .map(|g| encode_diploid(g))
                            .collect();
                        scan_result = Some(MergedRow::new(
                            record.chrom().to_string(),
                            record.pos(),
                            record.ref_allele().to_string(),
                            // the modern ALT is authoritative when the archaic ALT was a wildcard
                            m.alt_allele().to_string(),
                            archaic_count,
                            modern_counts
                        ));
                    }
                    CursorAction::Stop
                }
            };

            match action {
                CursorAction::Advance => cursor.advance(),
                CursorAction::Stop => break
            }
        }

        match scan_result {
            Some(row) => {
                sink.write_row(&row)?;
                summary.matched_rows += 1;
            },
            None => {
                summary.unmatched_sites += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use crate::parsing::vcf_reader::VcfReader;

    /// Sink that keeps everything in memory for inspection
    #[derive(Default)]
    struct MemorySink {
        header: Option<Vec<String>>,
        rows: Vec<MergedRow>
    }

    impl RowSink for MemorySink {
        fn write_header(&mut self, archaic_sample: &str, modern_samples: &[String]) -> anyhow::Result<()> {
            let mut header = vec![archaic_sample.to_string()];
            header.extend(modern_samples.iter().cloned());
            self.header = Some(header);
            Ok(())
        }

        fn write_row(&mut self, row: &MergedRow) -> anyhow::Result<()> {
            self.rows.push(row.clone());
            Ok(())
        }
    }

    /// Helper that builds a record on "chr1" with the given site info
    fn site(pos: u64, ref_allele: &str, alt_allele: &str, genotypes: &[&str]) -> VariantRecord {
        VariantRecord::new(
            "chr1".to_string(),
            pos,
            ref_allele.to_string(),
            alt_allele.to_string(),
            genotypes.iter().map(|g| g.to_string()).collect()
        )
    }

    /// Helper that runs a full merge over in-memory record sets
    fn run_merge(archaic: Vec<VariantRecord>, modern: Vec<VariantRecord>, modern_sample_count: usize) -> (MergeSummary, Vec<MergedRow>) {
        let pool = PositionPool::from_records(modern.iter().cloned().map(Ok)).unwrap();
        let mut sink = MemorySink::default();
        let summary = merge_streams(
            archaic.into_iter().map(Ok),
            modern.into_iter().map(Ok),
            &pool,
            modern_sample_count,
            &mut sink
        ).unwrap();
        (summary, sink.rows)
    }

    #[test]
    fn test_private_variant() {
        // archaic-only site with a non-reference call; modern never mentions pos=100
        let archaic = vec![site(100, "A", "T", &["0/1"])];
        let modern = vec![site(300, "T", "A", &["0/0", "0/1"])];
        let (summary, rows) = run_merge(archaic, modern, 2);

        assert_eq!(rows, vec![
            MergedRow::new("chr1".to_string(), 100, "A".to_string(), "T".to_string(), 1, vec![0, 0])
        ]);
        assert_eq!(summary.private_rows(), 1);
        assert_eq!(summary.rows_emitted(), 1);
    }

    #[test]
    fn test_private_requires_nonzero_genotype() {
        // homozygous-reference archaic call at an absent position emits nothing
        let archaic = vec![site(100, "A", "T", &["0/0"])];
        let modern = vec![site(300, "T", "A", &["0/1"])];
        let (summary, rows) = run_merge(archaic, modern, 1);

        assert!(rows.is_empty());
        assert_eq!(summary.unmatched_sites(), 1);
    }

    #[test]
    fn test_matched_site() {
        let archaic = vec![site(200, "G", "C", &["1/1"])];
        let modern = vec![site(200, "G", "C", &["0/1"])];
        let (summary, rows) = run_merge(archaic, modern, 1);

        assert_eq!(rows, vec![
            MergedRow::new("chr1".to_string(), 200, "G".to_string(), "C".to_string(), 2, vec![1])
        ]);
        assert_eq!(summary.matched_rows(), 1);
    }

    #[test]
    fn test_wildcard_alt_uses_modern_allele() {
        let archaic = vec![site(200, "G", ".", &["0/1"])];
        let modern = vec![site(200, "G", "A", &["1/1", "./."])];
        let (_summary, rows) = run_merge(archaic, modern, 2);

        // the modern ALT replaces the wildcard; the unresolved modern call decodes to 0
        assert_eq!(rows, vec![
            MergedRow::new("chr1".to_string(), 200, "G".to_string(), "A".to_string(), 1, vec![2, 0])
        ]);
    }

    #[test]
    fn test_non_snv_filter_is_total() {
        // neither the paired scan nor the private path may emit for non-SNV sites
        let archaic = vec![
            site(100, "AT", "A", &["1/1"]),
            site(200, "G", "CA", &["1/1"])
        ];
        let modern = vec![site(200, "G", "C", &["0/1"])];
        let (summary, rows) = run_merge(archaic, modern, 1);

        assert!(rows.is_empty());
        assert_eq!(summary.non_snv_skipped(), 2);
        assert_eq!(summary.archaic_records(), 2);
    }

    #[test]
    fn test_incompatible_alleles_emit_nothing() {
        // REF disagrees at the matched position
        let archaic = vec![site(200, "G", "C", &["1/1"])];
        let modern = vec![site(200, "T", "C", &["0/1"])];
        let (summary, rows) = run_merge(archaic, modern, 1);
        assert!(rows.is_empty());
        assert_eq!(summary.unmatched_sites(), 1);

        // ALT disagrees and the archaic ALT is not the wildcard
        let archaic = vec![site(200, "G", "C", &["1/1"])];
        let modern = vec![site(200, "G", "A", &["0/1"])];
        let (summary, rows) = run_merge(archaic, modern, 1);
        assert!(rows.is_empty());
        assert_eq!(summary.unmatched_sites(), 1);
    }

    #[test]
    fn test_cursor_never_rewinds() {
        // interleaved positions; the cursor has to discard 100, match 200,
        // stay put for the private 250, then match 300
        let archaic = vec![
            site(150, "A", "T", &["0/1"]),
            site(200, "G", "C", &["1/1"]),
            site(250, "C", "G", &["0/1"]),
            site(300, "T", "A", &["0/1"])
        ];
        let modern = vec![
            site(100, "A", "G", &["0/1"]),
            site(200, "G", "C", &["0/0"]),
            site(300, "T", "A", &["1/1"])
        ];
        let (summary, rows) = run_merge(archaic, modern, 1);

        assert_eq!(rows, vec![
            MergedRow::new("chr1".to_string(), 150, "A".to_string(), "T".to_string(), 1, vec![0]),
            MergedRow::new("chr1".to_string(), 200, "G".to_string(), "C".to_string(), 2, vec![0]),
            MergedRow::new("chr1".to_string(), 250, "C".to_string(), "G".to_string(), 1, vec![0]),
            MergedRow::new("chr1".to_string(), 300, "T".to_string(), "A".to_string(), 1, vec![2])
        ]);
        assert_eq!(summary.private_rows(), 2);
        assert_eq!(summary.matched_rows(), 2);
    }

    #[test]
    fn test_exhausted_cursor_leaves_private_path() {
        // archaic positions run past the end of the modern file
        let archaic = vec![
            site(200, "G", "C", &["1/1"]),
            site(500, "A", "T", &["0/1"]),
            site(600, "C", "G", &["0/0"])
        ];
        let modern = vec![site(200, "G", "C", &["0/1"])];
        let (summary, rows) = run_merge(archaic, modern, 1);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], MergedRow::new("chr1".to_string(), 500, "A".to_string(), "T".to_string(), 1, vec![0]));
        assert_eq!(summary.matched_rows(), 1);
        assert_eq!(summary.private_rows(), 1);
        // the 0/0 record at 600 has nothing to match and nothing private to report
        assert_eq!(summary.unmatched_sites(), 1);
    }

    #[test]
    fn test_empty_modern_stream() {
        let archaic = vec![
            site(100, "A", "T", &["0/1"]),
            site(200, "G", "C", &["0/0"])
        ];
        let (summary, rows) = run_merge(archaic, vec![], 3);

        // private rows still come out, sized to the modern sample count
        assert_eq!(rows, vec![
            MergedRow::new("chr1".to_string(), 100, "A".to_string(), "T".to_string(), 1, vec![0, 0, 0])
        ]);
        assert_eq!(summary.unmatched_sites(), 1);
    }

    #[test]
    fn test_empty_archaic_stream() {
        let modern = vec![site(200, "G", "C", &["0/1"])];
        let (summary, rows) = run_merge(vec![], modern, 1);
        assert!(rows.is_empty());
        assert_eq!(summary, MergeSummary::default());
    }

    #[test]
    fn test_duplicate_modern_position_first_wins() {
        // two modern rows at pos=200; only the first is considered, compatible or not
        let archaic = vec![site(200, "G", "C", &["1/1"])];
        let modern = vec![
            site(200, "G", "A", &["0/1"]),
            site(200, "G", "C", &["1/1"])
        ];
        let (summary, rows) = run_merge(archaic, modern, 1);
        assert!(rows.is_empty());
        assert_eq!(summary.unmatched_sites(), 1);
    }

    #[test]
    fn test_ensure_same_chromosome() {
        assert_eq!(ensure_same_chromosome("chr1", Some("chr1")), Ok(()));
        // an empty modern file cannot disagree
        assert_eq!(ensure_same_chromosome("chr1", None), Ok(()));

        let error = ensure_same_chromosome("chr1", Some("chr2")).unwrap_err();
        assert_eq!(error, MergeError::ChromosomeMismatch {
            archaic: "chr1".to_string(),
            modern: "chr2".to_string()
        });
    }

    #[test]
    fn test_position_pool() {
        let modern = vec![
            site(100, "A", "T", &["0/1"]),
            site(100, "A", "G", &["0/1"]),
            site(300, "T", "A", &["0/0"])
        ];
        let pool = PositionPool::from_records(modern.into_iter().map(Ok)).unwrap();

        // duplicates collapse; only presence matters
        assert_eq!(pool.len(), 2);
        assert!(pool.contains(100));
        assert!(pool.contains(300));
        assert!(!pool.contains(200));
        assert!(!pool.is_empty());
    }

    #[test]
    fn test_file_backed_merge() {
        // full pipeline over the checked-in chr1 example, minus the gzip output
        let archaic_fn = PathBuf::from("test_data/chr1_example/archaic.vcf");
        let modern_fn = PathBuf::from("test_data/chr1_example/modern.vcf");

        let pool = PositionPool::from_records(VcfReader::open(&modern_fn).unwrap()).unwrap();
        assert_eq!(pool.len(), 3);

        let mut archaic_reader = VcfReader::open(&archaic_fn).unwrap();
        let modern_reader = VcfReader::open(&modern_fn).unwrap();
        assert_eq!(archaic_reader.first_chrom().unwrap(), Some("chr1".to_string()));

        let mut sink = MemorySink::default();
        sink.write_header("Vindija33.19", &modern_reader.sample_names().to_vec()).unwrap();
        let summary = merge_streams(archaic_reader, modern_reader, &pool, 2, &mut sink).unwrap();

        assert_eq!(sink.header, Some(vec![
            "Vindija33.19".to_string(), "UV1001".to_string(), "UV1002".to_string()
        ]));
        assert_eq!(sink.rows, vec![
            // private archaic variant, absent from the modern file
            MergedRow::new("chr1".to_string(), 100, "A".to_string(), "T".to_string(), 1, vec![0, 0]),
            // exact allele match
            MergedRow::new("chr1".to_string(), 200, "G".to_string(), "C".to_string(), 2, vec![1, 2]),
            // wildcard archaic ALT resolved by the modern allele
            MergedRow::new("chr1".to_string(), 300, "T".to_string(), "A".to_string(), 1, vec![0, 1]),
            // matched site where the archaic call was unresolved and decodes to 0
            MergedRow::new("chr1".to_string(), 400, "C".to_string(), "G".to_string(), 0, vec![0, 2])
        ]);
        assert_eq!(summary.archaic_records(), 5);
        assert_eq!(summary.non_snv_skipped(), 1);
        assert_eq!(summary.private_rows(), 1);
        assert_eq!(summary.matched_rows(), 3);
        assert_eq!(summary.unmatched_sites(), 0);
    }
}
