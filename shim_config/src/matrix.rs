//! ASCII matrix import for shim value tables and preemphasis filter files.
//!
//! A matrix file holds one row per line. Values are separated by whitespace,
//! or by commas when the file contains any; comma files go through the `csv`
//! reader. Blank lines are skipped and the first row fixes the column count.

use std::path::Path;

use eyre::WrapErr;

/// Row-major matrix as read from disk, before any shape checks by the core.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixData {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f32>,
}

impl MatrixData {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0.0; rows * cols],
        }
    }

    pub fn row(&self, r: usize) -> &[f32] {
        &self.values[r * self.cols..(r + 1) * self.cols]
    }
}

fn parse_field(field: &str, line: usize) -> eyre::Result<f32> {
    field
        .parse::<f32>()
        .wrap_err_with(|| format!("line {line}: invalid number {field:?}"))
}

fn push_row(out: &mut MatrixData, row: Vec<f32>, line: usize) -> eyre::Result<()> {
    if out.cols == 0 {
        out.cols = row.len();
    } else if row.len() != out.cols {
        eyre::bail!(
            "line {line}: expected {} columns, found {}",
            out.cols,
            row.len()
        );
    }
    out.values.extend(row);
    out.rows += 1;
    Ok(())
}

fn parse_whitespace(text: &str, out: &mut MatrixData) -> eyre::Result<()> {
    for (idx, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let row = fields
            .iter()
            .map(|f| parse_field(f, idx + 1))
            .collect::<eyre::Result<Vec<f32>>>()?;
        push_row(out, row, idx + 1)?;
    }
    Ok(())
}

fn parse_comma(text: &str, out: &mut MatrixData) -> eyre::Result<()> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    for rec in rdr.records() {
        let rec = rec.wrap_err("read csv record")?;
        let line = rec.position().map(|p| p.line() as usize).unwrap_or(0);
        let row = rec
            .iter()
            .filter(|f| !f.is_empty())
            .map(|f| parse_field(f, line))
            .collect::<eyre::Result<Vec<f32>>>()?;
        if row.is_empty() {
            continue;
        }
        push_row(out, row, line)?;
    }
    Ok(())
}

/// Parse matrix text, prepending `pad_rows` rows of zeros.
pub fn parse_matrix(text: &str, pad_rows: usize) -> eyre::Result<MatrixData> {
    let mut body = MatrixData::zeros(0, 0);
    if text.contains(',') {
        parse_comma(text, &mut body)?;
    } else {
        parse_whitespace(text, &mut body)?;
    }
    if body.rows == 0 || body.cols == 0 {
        eyre::bail!("matrix is empty");
    }

    if pad_rows == 0 {
        return Ok(body);
    }
    let mut values = vec![0.0; pad_rows * body.cols];
    values.extend(body.values);
    Ok(MatrixData {
        rows: body.rows + pad_rows,
        cols: body.cols,
        values,
    })
}

/// Read and parse a matrix file.
pub fn load_matrix(path: &Path, pad_rows: usize) -> eyre::Result<MatrixData> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read matrix file {}", path.display()))?;
    parse_matrix(&text, pad_rows).wrap_err_with(|| format!("parse {}", path.display()))
}

/// Preemphasis coefficients for every (input, output) channel pair.
///
/// `taps` is laid out `[in][out][k]` with `k < 2 * order`: the first `order`
/// taps weight the input's setpoint history, the remaining `order` the
/// pair's output history.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterBank {
    pub channels: usize,
    pub order: usize,
    pub taps: Vec<f32>,
}

impl FilterBank {
    /// A bank with no taps; the core treats it as a pass-through.
    pub fn passthrough(channels: usize) -> Self {
        Self {
            channels,
            order: 0,
            taps: Vec::new(),
        }
    }

    pub fn taps(&self, in_ch: usize, out_ch: usize) -> &[f32] {
        let width = 2 * self.order;
        let start = (in_ch * self.channels + out_ch) * width;
        &self.taps[start..start + width]
    }
}

/// Load `ch{k}.csv` for every `k < channels` from `dir`.
///
/// File `k` row `c` holds the taps from input `k` to output `c`. Missing files become
/// zero filters; files with fewer than `channels` rows are padded with zeros.
pub fn load_filter_dir(dir: &Path, channels: usize) -> eyre::Result<FilterBank> {
    if !dir.is_dir() {
        eyre::bail!("preemphasis filter directory {} not found", dir.display());
    }

    let mut files: Vec<Option<MatrixData>> = Vec::with_capacity(channels);
    let mut width: Option<usize> = None;
    for k in 0..channels {
        let path = dir.join(format!("ch{k}.csv"));
        if !path.exists() {
            tracing::warn!(file = %path.display(), "missing preemphasis filter file, using zeros");
            files.push(None);
            continue;
        }
        let m = load_matrix(&path, 0)?;
        if m.cols % 2 != 0 {
            eyre::bail!(
                "{}: filter rows need an even number of taps, found {}",
                path.display(),
                m.cols
            );
        }
        if m.rows > channels {
            eyre::bail!(
                "{}: {} rows for {} channels",
                path.display(),
                m.rows,
                channels
            );
        }
        match width {
            None => width = Some(m.cols),
            Some(w) if w != m.cols => eyre::bail!(
                "{}: expected {} taps per row like the other filter files, found {}",
                path.display(),
                w,
                m.cols
            ),
            Some(_) => {}
        }
        if m.rows < channels {
            tracing::warn!(
                file = %path.display(),
                rows = m.rows,
                channels,
                "filter file has fewer rows than channels, padding with zeros"
            );
        }
        files.push(Some(m));
    }

    let Some(width) = width else {
        tracing::warn!(dir = %dir.display(), "no preemphasis filter files found, filter disabled");
        return Ok(FilterBank::passthrough(channels));
    };

    let mut taps = vec![0.0; channels * channels * width];
    for (k, file) in files.iter().enumerate() {
        let Some(m) = file else { continue };
        for c in 0..m.rows {
            let start = (k * channels + c) * width;
            taps[start..start + width].copy_from_slice(m.row(c));
        }
    }
    Ok(FilterBank {
        channels,
        order: width / 2,
        taps,
    })
}
