use core::fmt::Display;
use core::time::Duration;
use hashbrown::HashMap;

/// Execution durations aggregated per kernel name.
#[derive(Debug, Default)]
pub struct Profiled {
    durations: HashMap<String, ProfileItem>,
}

#[derive(Debug, Default, Clone)]
struct ProfileItem {
    total_duration: Duration,
    num_computed: usize,
}

impl ProfileItem {
    fn update(&mut self, duration: Duration) {
        self.total_duration += duration;
        self.num_computed += 1;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Control the amount of info being displayed when profiling.
pub enum ProfileLevel {
    /// Only the summary table.
    Basic,
    /// The summary table and one line per execution.
    Medium,
    /// The summary table and one detailed line per execution.
    Full,
}

impl Profiled {
    /// If nothing was profiled.
    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Number of executions recorded for a name.
    pub fn count(&self, name: &str) -> usize {
        self.durations
            .get(name)
            .map(|item| item.num_computed)
            .unwrap_or(0)
    }

    /// Record one execution. Only the first line of a multi-line name is kept.
    pub fn update(&mut self, name: &str, duration: Duration) {
        let name = name.lines().next().unwrap_or(name);

        match self.durations.get_mut(name) {
            Some(item) => item.update(duration),
            None => {
                self.durations.insert(
                    name.to_string(),
                    ProfileItem {
                        total_duration: duration,
                        num_computed: 1,
                    },
                );
            }
        }
    }
}

impl Display for Profiled {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let header_name = "Name";
        let header_num_computed = "Num Computed";
        let header_duration = "Duration";
        let header_ratio = "Ratio";

        let mut name_len = header_name.len();
        let mut num_computed_len = header_num_computed.len();
        let mut duration_len = header_duration.len();

        let total_duration: Duration = self.durations.values().map(|i| i.total_duration).sum();
        let total_computed: usize = self.durations.values().map(|i| i.num_computed).sum();
        let total_micros = total_duration.as_micros().max(1);

        let mut rows: Vec<(&str, String, String, Duration)> = self
            .durations
            .iter()
            .map(|(name, item)| {
                let num_computed = item.num_computed.to_string();
                let duration = format!("{:?}", item.total_duration);

                name_len = name_len.max(name.len());
                num_computed_len = num_computed_len.max(num_computed.len());
                duration_len = duration_len.max(duration.len());

                (name.as_str(), num_computed, duration, item.total_duration)
            })
            .collect();
        rows.sort_by(|a, b| b.3.cmp(&a.3));

        let total_duration_fmt = format!("{total_duration:?}");
        let total_computed_fmt = total_computed.to_string();
        let total_ratio_fmt = "100 %";

        duration_len = duration_len.max(total_duration_fmt.len());
        num_computed_len = num_computed_len.max(total_computed_fmt.len());
        let ratio_len = header_ratio.len().max(total_ratio_fmt.len());

        let line_length = name_len + duration_len + num_computed_len + ratio_len + 11;
        let write_line =
            |c: &str, f: &mut core::fmt::Formatter<'_>| writeln!(f, "|{}|", c.repeat(line_length));
        let write_row = |f: &mut core::fmt::Formatter<'_>,
                         name: &str,
                         duration: &str,
                         num_computed: &str,
                         ratio: &str| {
            writeln!(
                f,
                "| {name:<name_len$} | {duration:<duration_len$} | {num_computed:<num_computed_len$} | {ratio:<ratio_len$} |"
            )
        };

        write_line("⎺", f)?;
        write_row(f, header_name, header_duration, header_num_computed, header_ratio)?;
        write_line("⎼", f)?;

        for (name, num_computed, duration, total) in rows {
            let ratio = format!("{} %", 100 * total.as_micros() / total_micros);
            write_row(f, name, &duration, &num_computed, &ratio)?;
        }

        write_line("⎼", f)?;
        write_row(
            f,
            "Total",
            &total_duration_fmt,
            &total_computed_fmt,
            total_ratio_fmt,
        )?;
        write_line("⎯", f)
    }
}
