use crate::config::Config;
use crate::console::{InputError, Prompter};
use crate::report::{self, ClassSummary, TableWidths};
use crate::roster::Roster;
use crate::student::Student;
use anyhow::Context;
use chrono::Local;
use log::{debug, error, info};
use std::io::{BufRead, Write};

pub const BANNER: &str = "=== STUDENT MANAGEMENT SYSTEM ===";
pub const MENU: &str = "1.Add 2.Update 3.Delete 4.View Result 5.All Results 6.List 7.Exit";
const DONE_KEYWORD: &str = "done";
const RESERVED_SUBJECT: &str = "'done' is reserved and cannot be a subject name!";

/// Ends subject entry when adding a student, so it is never a subject name.
fn is_done_keyword(subject: &str) -> bool {
    subject.eq_ignore_ascii_case(DONE_KEYWORD)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Add,
    Update,
    Delete,
    ViewResult,
    AllResults,
    List,
    Exit,
}

impl Command {
    fn from_choice(n: i64) -> Option<Self> {
        match n {
            1 => Some(Command::Add),
            2 => Some(Command::Update),
            3 => Some(Command::Delete),
            4 => Some(Command::ViewResult),
            5 => Some(Command::AllResults),
            6 => Some(Command::List),
            7 => Some(Command::Exit),
            _ => None,
        }
    }
}

/// One interactive run: owns the roster and writes the report when it ends.
pub struct Session {
    roster: Roster,
    config: Config,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            roster: Roster::new(),
            config,
        }
    }

    #[cfg(test)]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Runs until the exit command or end of input, then writes the report.
    /// Only terminal I/O failures are returned as errors, and the report is
    /// still written before they are.
    pub fn run<R: BufRead, W: Write>(&mut self, p: &mut Prompter<R, W>) -> anyhow::Result<()> {
        p.say(BANNER)?;
        p.say("")?;
        loop {
            match self.step(p) {
                Ok(true) => {}
                Ok(false) => break,
                Err(InputError::Closed) => {
                    info!("input closed, ending session");
                    p.say("")?;
                    break;
                }
                Err(InputError::Io(e)) => {
                    error!("terminal i/o failed: {}", e);
                    if let Err(finish_err) = self.finish(p) {
                        error!("{:#}", finish_err);
                    }
                    return Err(e).context("terminal i/o failed");
                }
            }
        }
        self.finish(p)
    }

    fn step<R: BufRead, W: Write>(&mut self, p: &mut Prompter<R, W>) -> Result<bool, InputError> {
        p.say(MENU)?;
        let choice = p.read_int("Choice: ")?;
        let Some(cmd) = Command::from_choice(choice) else {
            p.say("Invalid choice")?;
            return Ok(true);
        };
        debug!("menu command {:?}", cmd);
        match cmd {
            Command::Add => self.add_student(p)?,
            Command::Update => self.update_student(p)?,
            Command::Delete => self.delete_student(p)?,
            Command::ViewResult => self.view_result(p)?,
            Command::AllResults => self.all_results(p)?,
            Command::List => self.list_students(p)?,
            Command::Exit => return Ok(false),
        }
        Ok(true)
    }

    fn add_student<R: BufRead, W: Write>(&mut self, p: &mut Prompter<R, W>) -> Result<(), InputError> {
        let id = p.read_non_empty("Student ID: ")?;
        if self.roster.exists(&id) {
            p.say("ID exists!")?;
            return Ok(());
        }
        let name = p.read_non_empty("Name: ")?;
        let mut student = match Student::new(id, name) {
            Ok(s) => s,
            Err(e) => {
                p.say(e.to_string())?;
                return Ok(());
            }
        };

        p.say("Add subjects (type 'done' to finish):")?;
        loop {
            let subject = p.read_non_empty("Subject: ")?;
            if is_done_keyword(&subject) {
                break;
            }
            let mark = p.read_mark("Mark (0-100): ")?;
            if let Err(e) = student.set_mark(subject, mark) {
                p.say(e.to_string())?;
            }
        }

        self.roster.add(student);
        p.say("Student added!")?;
        Ok(())
    }

    fn update_student<R: BufRead, W: Write>(
        &mut self,
        p: &mut Prompter<R, W>,
    ) -> Result<(), InputError> {
        let id = p.read_non_empty("Student ID: ")?;
        if !self.roster.exists(&id) {
            p.say("Not found!")?;
            return Ok(());
        }

        p.say("")?;
        p.say("What to update?")?;
        p.say("1. Name 2. Subjects/Marks 3. Cancel")?;
        match p.read_int("Choice: ")? {
            1 => {
                let name = p.read_non_empty("New name: ")?;
                if let Some(s) = self.roster.get_mut(&id) {
                    debug!("renamed student {}", id);
                    s.name = name;
                }
                p.say("Name updated!")?;
            }
            2 => self.update_subjects(p, &id)?,
            3 => p.say("Update cancelled.")?,
            _ => p.say("Invalid choice!")?,
        }
        Ok(())
    }

    fn update_subjects<R: BufRead, W: Write>(
        &mut self,
        p: &mut Prompter<R, W>,
        id: &str,
    ) -> Result<(), InputError> {
        let Some(student) = self.roster.get_mut(id) else {
            return Ok(());
        };
        loop {
            p.say("")?;
            p.say("Current subjects:")?;
            if student.subjects().is_empty() {
                p.say("  (none)")?;
            }
            for (subject, mark) in student.sorted_subjects() {
                p.say(format!("  {}: {:.2}", subject, mark))?;
            }

            p.say("")?;
            p.say("1.Add/Update 2.Remove 3.Done")?;
            match p.read_int("Choice: ")? {
                1 => {
                    let subject = p.read_non_empty("Subject: ")?;
                    if is_done_keyword(&subject) {
                        p.say(RESERVED_SUBJECT)?;
                        continue;
                    }
                    let mark = p.read_mark("Mark (0-100): ")?;
                    match student.set_mark(subject.as_str(), mark) {
                        Ok(_) => {
                            debug!("student {} {} = {}", id, subject, mark);
                            p.say("Subject updated!")?;
                        }
                        Err(e) => p.say(e.to_string())?,
                    }
                }
                2 => {
                    let subject = p.read_non_empty("Subject to remove: ")?;
                    if student.remove_subject(&subject) {
                        debug!("student {} dropped {}", id, subject);
                        p.say("Subject removed!")?;
                    } else {
                        p.say("Subject not found!")?;
                    }
                }
                3 => return Ok(()),
                _ => p.say("Invalid choice!")?,
            }
        }
    }

    fn delete_student<R: BufRead, W: Write>(
        &mut self,
        p: &mut Prompter<R, W>,
    ) -> Result<(), InputError> {
        let id = p.read_non_empty("Student ID: ")?;
        if self.roster.remove(&id) {
            p.say("Deleted!")?;
        } else {
            p.say("Not found!")?;
        }
        Ok(())
    }

    fn view_result<R: BufRead, W: Write>(&self, p: &mut Prompter<R, W>) -> Result<(), InputError> {
        let id = p.read_non_empty("Student ID: ")?;
        let Some(s) = self.roster.get(&id) else {
            p.say("Not found!")?;
            return Ok(());
        };
        p.say("")?;
        p.say(format!("Result: {} ({})", s.name, s.id()))?;
        for (subject, mark) in s.sorted_subjects() {
            p.say(format!("  {}: {:.2}", subject, mark))?;
        }
        p.say(format!(
            "Total: {:.2} | Average: {:.2} | Grade: {}",
            s.total(),
            s.average(),
            s.grade()
        ))?;
        Ok(())
    }

    fn all_results<R: BufRead, W: Write>(&self, p: &mut Prompter<R, W>) -> Result<(), InputError> {
        let ranked = report::rank_by_average(&self.roster.list_all());
        let rows = report::results_for(&ranked);
        p.say("")?;
        write!(p.output(), "{}", report::render_table(&rows, TableWidths::for_rows(&rows)))?;
        Ok(())
    }

    fn list_students<R: BufRead, W: Write>(&self, p: &mut Prompter<R, W>) -> Result<(), InputError> {
        let rows = report::results_for(&self.roster.list_all());
        p.say("")?;
        write!(p.output(), "{}", report::render_table(&rows, TableWidths::for_rows(&rows)))?;
        Ok(())
    }

    fn finish<R: BufRead, W: Write>(&self, p: &mut Prompter<R, W>) -> anyhow::Result<()> {
        let summary = ClassSummary::build(&self.roster, Local::now().naive_local());
        let text = report::render_report(&summary);

        // Both files are written before anything is printed.
        let path = &self.config.report_path;
        let report_msg = match report::write_report(path, &text) {
            Ok(()) => format!("Report saved to {}", path.display()),
            Err(e) => {
                error!("{:#}", e);
                format!("Error saving report: {:#}", e)
            }
        };
        let summary_msg = self.config.summary_json.as_ref().map(|path| {
            match report::write_summary_json(path, &summary) {
                Ok(()) => format!("Summary saved to {}", path.display()),
                Err(e) => {
                    error!("{:#}", e);
                    format!("Error saving summary: {:#}", e)
                }
            }
        });

        p.say(report_msg)?;
        if let Some(msg) = summary_msg {
            p.say(msg)?;
        }
        p.say("Goodbye!")?;
        p.output().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, BufReader, Cursor, Read};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn run_script(config: Config, script: &str) -> (Session, String) {
        run_bytes(config, script.as_bytes())
    }

    fn run_bytes(config: Config, script: &[u8]) -> (Session, String) {
        let mut session = Session::new(config);
        let mut p = Prompter::new(Cursor::new(script.to_vec()), Vec::new());
        session.run(&mut p).expect("session run");
        let out = String::from_utf8(p.into_output()).expect("utf8 output");
        (session, out)
    }

    struct BrokenInput;

    impl Read for BrokenInput {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal gone"))
        }
    }

    fn config_in(dir: &PathBuf) -> Config {
        Config {
            report_path: dir.join("report.txt"),
            ..Config::default()
        }
    }

    const ALICE_AND_BOB: &str = "1\nS1\nAlice\nMath\n90\nSci\n80\ndone\n1\nS2\nBob\nMath\n70\nDONE\n";

    #[test]
    fn add_and_view_reflects_metrics() {
        let dir = temp_dir("gradebook-session-view");
        let script = format!("{}4\nS1\n7\n", ALICE_AND_BOB);
        let (session, out) = run_script(config_in(&dir), &script);

        assert_eq!(session.roster().len(), 2);
        assert!(out.contains("Student added!"));
        assert!(out.contains("Result: Alice (S1)"));
        assert!(out.contains("  Math: 90.00"));
        assert!(out.contains("Total: 170.00 | Average: 85.00 | Grade: A"));
        assert!(out.contains("Report saved to"));
        assert!(out.trim_end().ends_with("Goodbye!"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn duplicate_id_is_rejected_without_touching_record() {
        let dir = temp_dir("gradebook-session-dup");
        let script = format!("{}1\nS1\n7\n", ALICE_AND_BOB);
        let (session, out) = run_script(config_in(&dir), &script);

        assert!(out.contains("ID exists!"));
        let s1 = session.roster().get("S1").expect("S1");
        assert_eq!(s1.name, "Alice");
        assert_eq!(s1.subjects().len(), 2);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn invalid_menu_input_reprompts() {
        let dir = temp_dir("gradebook-session-invalid");
        let (_, out) = run_script(config_in(&dir), "abc\n9\n\n7\n");

        assert!(out.contains("Enter a valid number!"));
        assert!(out.contains("Invalid choice"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn mark_prompt_retries_until_in_range() {
        let dir = temp_dir("gradebook-session-mark");
        let (session, out) = run_script(config_in(&dir), "1\nS9\nZed\nArt\n150\nx\n-1\n55.5\ndone\n7\n");

        assert!(out.contains("Enter between 0-100"));
        assert!(out.contains("Enter a valid number!"));
        let s = session.roster().get("S9").expect("S9");
        assert_eq!(s.mark("Art"), Some(55.5));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn update_name_and_subjects() {
        let dir = temp_dir("gradebook-session-update");
        let script = format!(
            "{}2\nS2\n1\nBobby\n2\nS2\n2\n1\nSci\n60\n2\nHistory\n2\nMath\n3\n4\nS2\n7\n",
            ALICE_AND_BOB
        );
        let (session, out) = run_script(config_in(&dir), &script);

        assert!(out.contains("Name updated!"));
        assert!(out.contains("Subject updated!"));
        assert!(out.contains("Subject not found!"));
        assert!(out.contains("Subject removed!"));
        assert!(out.contains("Result: Bobby (S2)"));

        let s2 = session.roster().get("S2").expect("S2");
        assert_eq!(s2.name, "Bobby");
        assert_eq!(s2.mark("Math"), None);
        assert_eq!(s2.mark("Sci"), Some(60.0));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn update_and_delete_missing_student() {
        let dir = temp_dir("gradebook-session-missing");
        let (_, out) = run_script(config_in(&dir), "2\nNOPE\n3\nNOPE\n4\nNOPE\n7\n");
        assert_eq!(out.matches("Not found!").count(), 3);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn empty_roster_tables_and_report() {
        let dir = temp_dir("gradebook-session-empty");
        let (_, out) = run_script(config_in(&dir), "5\n6\n7\n");
        assert_eq!(out.matches(report::NO_STUDENTS).count(), 2);

        let text = std::fs::read_to_string(dir.join("report.txt")).expect("read report");
        assert!(text.contains(report::NO_DATA));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn end_of_input_still_writes_report() {
        let dir = temp_dir("gradebook-session-eof");
        let (_, out) = run_script(config_in(&dir), ALICE_AND_BOB);

        assert!(out.contains("Report saved to"));
        let text = std::fs::read_to_string(dir.join("report.txt")).expect("read report");
        assert!(text.contains("Top student: Alice (S1), average 85.00, grade A"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn report_write_failure_is_not_fatal() {
        let dir = temp_dir("gradebook-session-badpath");
        let config = Config {
            report_path: dir.join("missing-dir").join("report.txt"),
            ..Config::default()
        };
        let (_, out) = run_script(config, "7\n");

        assert!(out.contains("Error saving report:"));
        assert!(out.trim_end().ends_with("Goodbye!"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn summary_json_written_when_configured() {
        let dir = temp_dir("gradebook-session-json");
        let config = Config {
            summary_json: Some(dir.join("summary.json")),
            ..config_in(&dir)
        };
        let (_, out) = run_script(config, &format!("{}7\n", ALICE_AND_BOB));
        assert!(out.contains("Summary saved to"));

        let text = std::fs::read_to_string(dir.join("summary.json")).expect("read summary");
        let v: serde_json::Value = serde_json::from_str(&text).expect("parse summary");
        assert_eq!(v["studentCount"], 2);
        assert_eq!(v["topStudent"]["id"], "S1");
        assert_eq!(v["topStudent"]["grade"], "A");
        assert_eq!(v["subjectAverages"][0]["subject"], "Math");
        assert_eq!(v["subjectAverages"][0]["count"], 2);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn undecodable_menu_choice_is_retried() {
        let dir = temp_dir("gradebook-session-utf8-menu");
        let mut script = ALICE_AND_BOB.as_bytes().to_vec();
        script.extend_from_slice(b"\xff\xfe\n7\n");
        let (session, out) = run_bytes(config_in(&dir), &script);

        assert!(out.contains("Enter a valid number!"));
        assert_eq!(session.roster().len(), 2);
        let text = std::fs::read_to_string(dir.join("report.txt")).expect("read report");
        assert!(text.contains("Top student: Alice (S1)"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn undecodable_name_and_mark_are_retried() {
        let dir = temp_dir("gradebook-session-utf8-fields");
        let mut script = b"1\nS1\n".to_vec();
        script.extend_from_slice(b"\xff\nAlice\nMath\n\xfe\n90\ndone\n7\n");
        let (session, out) = run_bytes(config_in(&dir), &script);

        assert!(out.contains("Cannot be empty!"));
        assert!(out.contains("Enter a valid number!"));
        let s1 = session.roster().get("S1").expect("S1");
        assert_eq!(s1.name, "Alice");
        assert_eq!(s1.mark("Math"), Some(90.0));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn broken_input_still_writes_report() {
        let dir = temp_dir("gradebook-session-broken");
        let mut session = Session::new(config_in(&dir));
        let mut p = Prompter::new(BufReader::new(BrokenInput), Vec::new());

        let err = session.run(&mut p).expect_err("broken input");
        assert!(format!("{:#}", err).contains("terminal i/o failed"));
        let text = std::fs::read_to_string(dir.join("report.txt")).expect("read report");
        assert!(text.contains(report::NO_DATA));
        let out = String::from_utf8(p.into_output()).expect("utf8 output");
        assert!(out.contains("Report saved to"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn done_is_not_accepted_as_subject_when_updating() {
        let dir = temp_dir("gradebook-session-done-subject");
        let script = format!("{}2\nS1\n2\n1\nDone\n3\n7\n", ALICE_AND_BOB);
        let (session, out) = run_script(config_in(&dir), &script);

        assert!(out.contains(RESERVED_SUBJECT));
        let s1 = session.roster().get("S1").expect("S1");
        assert_eq!(s1.subjects().len(), 2);
        assert_eq!(s1.mark("Done"), None);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn view_lists_subjects_ignoring_case() {
        let dir = temp_dir("gradebook-session-subject-order");
        let script = "1\nS1\nAda\nZoology\n50\nart\n60\ndone\n4\nS1\n7\n";
        let (_, out) = run_script(config_in(&dir), script);

        let art = out.find("  art: 60.00").expect("art line");
        let zoology = out.find("  Zoology: 50.00").expect("zoology line");
        assert!(art < zoology);
        let _ = std::fs::remove_dir_all(dir);
    }
}
