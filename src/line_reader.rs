use anyhow::{Context, Result, anyhow};
use std::io::BufRead;

pub struct LineReader<'a> {
    reader: &'a mut dyn BufRead,
    line_no: usize,
    line: String,
}

impl<'a> LineReader<'a> {
    pub fn new(reader: &'a mut (dyn BufRead + 'a)) -> Self {
        LineReader::<'a> {
            reader: reader,
            line_no: 0,
            line: String::new(),
        }
    }

    pub fn get_last_line_number(&self) -> usize {
        self.line_no
    }

    pub fn get_last_line(&self) -> &str {
        &self.line
    }

    pub fn next_line_raw(&mut self) -> Result<()> {
        self.line.clear();

        match self.reader.read_line(&mut self.line) {
            Ok(0) => return Err(anyhow!("premature end of file")),
            Ok(_n) => {
                if self.line.ends_with('\n') {
                    self.line.pop();
                    if self.line.ends_with('\r') {
                        self.line.pop();
                    }
                }
                self.line_no += 1;
                return Ok(());
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn next_line_string(&mut self) -> Result<String> {
        self.next_line()?;
        Ok(self.get_last_line().to_string())
    }

    pub fn next_line_index(&mut self) -> Result<usize> {
        self.next_line()?;
        self.get_last_line()
            .trim()
            .parse::<usize>()
            .with_context(|| {
                format!(
                    "failed to read integer at line {}; found `{}`",
                    self.get_last_line_number(),
                    self.get_last_line()
                )
            })
    }

    /**
     * Reads a line of whitespace-separated natural numbers.
     */
    pub fn next_line_naturals(&mut self) -> Result<Vec<u64>> {
        self.next_line()?;
        let line_no = self.get_last_line_number();
        self.get_last_line()
            .split_whitespace()
            .enumerate()
            .map(|(column, token)| {
                token.parse::<u64>().with_context(|| {
                    format!(
                        "failed to read integer in column {} at line {}; found `{}`",
                        column + 1,
                        line_no,
                        token
                    )
                })
            })
            .collect()
    }

    pub fn next_line(&mut self) -> Result<()> {
        //read line and unpack
        self.next_line_raw()?;
        while self.get_last_line().trim_start().starts_with('#') {
            self.next_line_raw()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::LineReader;

    #[test]
    fn line_reader_skips_comments() {
        let mut reader = Cursor::new("# a comment\n  # another\n12\n3 4 5\r\n");
        let mut lreader = LineReader::new(&mut reader);

        assert_eq!(lreader.next_line_index().unwrap(), 12);
        assert_eq!(lreader.get_last_line_number(), 3);
        assert_eq!(lreader.next_line_naturals().unwrap(), vec![3, 4, 5]);
        assert!(lreader.next_line().is_err());
    }

    #[test]
    fn line_reader_rejects_garbage() {
        let mut reader = Cursor::new("3 x 5\n");
        let mut lreader = LineReader::new(&mut reader);

        let error = lreader.next_line_naturals().unwrap_err();
        assert!(format!("{:#}", error).contains("column 2 at line 1"));
    }
}
