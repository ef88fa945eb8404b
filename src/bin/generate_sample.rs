use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;

/// Write a synthetic student performance dataset
#[derive(Parser)]
#[command(name = "generate_sample")]
struct Cli {
    /// Output path; `.parquet` writes Parquet, anything else `;`-separated CSV
    #[arg(default_value = "students.csv")]
    output: PathBuf,
    /// Number of students
    #[arg(short = 'n', long, default_value = "395")]
    rows: usize,
    /// PRNG seed
    #[arg(long, default_value = "42")]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    /// Uniform integer in `lo..=hi`.
    fn range(&mut self, lo: i64, hi: i64) -> i64 {
        lo + (self.next_f64() * (hi - lo + 1) as f64) as i64
    }

    fn pick<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options[self.range(0, options.len() as i64 - 1) as usize]
    }
}

const TEXT_COLUMNS: [&str; 8] = [
    "school", "sex", "address", "famsize", "Pstatus", "Mjob", "internet", "romantic",
];
const INT_COLUMNS: [&str; 11] = [
    "age", "Medu", "Fedu", "studytime", "failures", "Dalc", "Walc", "health", "absences", "G1",
    "G2",
];
const FINAL_GRADE: &str = "G3";

/// One generated student, column-major friendly.
struct Student {
    text: [String; 8],
    ints: [i64; 12],
}

fn clamp_grade(g: f64) -> i64 {
    g.round().clamp(0.0, 20.0) as i64
}

fn generate_student(rng: &mut SimpleRng) -> Student {
    let school = rng.pick(&["GP", "GP", "GP", "MS"]);
    let studytime = rng.range(1, 4);
    let failures = if rng.next_f64() < 0.8 { 0 } else { rng.range(1, 3) };
    let absences = (rng.gauss(0.0, 6.0).abs()).round() as i64;
    let medu = rng.range(0, 4);

    // Ability drives all three periods so grades correlate strongly.
    let ability = rng.gauss(11.0, 3.0) + 0.6 * studytime as f64 - 1.5 * failures as f64
        + 0.3 * medu as f64
        - 0.05 * absences as f64;
    let g1 = clamp_grade(ability + rng.gauss(0.0, 1.2));
    let g2 = clamp_grade(ability + rng.gauss(0.0, 1.0));
    let g3 = clamp_grade(ability + rng.gauss(0.3, 1.3));

    Student {
        text: [
            school.to_string(),
            rng.pick(&["F", "M"]).to_string(),
            rng.pick(&["U", "U", "U", "R"]).to_string(),
            rng.pick(&["GT3", "LE3"]).to_string(),
            rng.pick(&["T", "T", "A"]).to_string(),
            rng.pick(&["teacher", "health", "services", "at_home", "other"]).to_string(),
            rng.pick(&["yes", "yes", "no"]).to_string(),
            rng.pick(&["no", "no", "yes"]).to_string(),
        ],
        ints: [
            rng.range(15, 22),
            medu,
            rng.range(0, 4),
            studytime,
            failures,
            rng.range(1, 5),
            rng.range(1, 5),
            rng.range(1, 5),
            absences,
            g1,
            g2,
            g3,
        ],
    }
}

fn headers() -> Vec<&'static str> {
    TEXT_COLUMNS
        .iter()
        .chain(INT_COLUMNS.iter())
        .copied()
        .chain(std::iter::once(FINAL_GRADE))
        .collect()
}

fn write_csv(path: &Path, students: &[Student]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .context("creating CSV output")?;
    writer.write_record(headers()).context("writing CSV header")?;
    for st in students {
        let row: Vec<String> = st
            .text
            .iter()
            .cloned()
            .chain(st.ints.iter().map(|i| i.to_string()))
            .collect();
        writer.write_record(&row).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV output")?;
    Ok(())
}

fn write_parquet(path: &Path, students: &[Student]) -> Result<()> {
    let names = headers();
    let mut fields = Vec::with_capacity(names.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(names.len());

    for (c, name) in names.iter().enumerate() {
        if c < TEXT_COLUMNS.len() {
            fields.push(Field::new(*name, DataType::Utf8, false));
            let values: Vec<&str> = students.iter().map(|s| s.text[c].as_str()).collect();
            arrays.push(Arc::new(StringArray::from(values)));
        } else {
            let i = c - TEXT_COLUMNS.len();
            fields.push(Field::new(*name, DataType::Int64, false));
            let values: Vec<i64> = students.iter().map(|s| s.ints[i]).collect();
            arrays.push(Arc::new(Int64Array::from(values)));
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet output")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut rng = SimpleRng::new(cli.seed);
    let students: Vec<Student> = (0..cli.rows).map(|_| generate_student(&mut rng)).collect();

    let is_parquet = cli
        .output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"));
    if is_parquet {
        write_parquet(&cli.output, &students)?;
    } else {
        write_csv(&cli.output, &students)?;
    }

    log::info!("seed {} produced {} students", cli.seed, students.len());
    println!("Wrote {} students to {}", students.len(), cli.output.display());
    Ok(())
}
