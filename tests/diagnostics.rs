use std::{
    cell::RefCell,
    io::Write,
    rc::Rc,
};

use pretty_assertions::assert_eq;
use rilasm::{diagnostics::Warning, AsmError, ErrorKind, Location, Report};

/// A sink that can be handed to a `Report` while the test keeps reading it.
#[derive(Debug, Clone, Default)]
struct SharedSink(Rc<RefCell<Vec<u8>>>);

impl SharedSink {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("sink holds invalid UTF-8")
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn report_with_sinks() -> (Report, SharedSink, SharedSink, SharedSink) {
    yansi::disable();
    let messages = SharedSink::default();
    let warnings = SharedSink::default();
    let errors = SharedSink::default();
    let report = Report::new(
        Box::new(messages.clone()),
        Box::new(warnings.clone()),
        Box::new(errors.clone()),
    );
    (report, messages, warnings, errors)
}

#[test]
fn warnings_carry_location_and_code() {
    let (mut report, _, warnings, _) = report_with_sinks();
    report.set_file_path("test.il");

    report.warning(
        Warning::LayoutIgnored,
        Some(Location { line: 3, column: 7 }),
        "layout attributes are ignored for this type",
    );

    assert_eq!(
        warnings.contents(),
        "test.il:3,7: Warning ILW0002: layout attributes are ignored for this type\n",
    );
}

#[test]
fn warnings_without_location_omit_the_prefix() {
    let (mut report, _, warnings, _) = report_with_sinks();

    report.warning(Warning::InvalidPackingSize, None, "packing size 3 is invalid");

    assert_eq!(
        warnings.contents(),
        "Warning ILW0001: packing size 3 is invalid\n",
    );
}

#[test]
fn warnings_fall_back_to_the_tracked_location() {
    let (mut report, _, warnings, _) = report_with_sinks();
    report.set_file_path("test.il");
    report.set_location(Some(Location { line: 12, column: 1 }));

    report.warning(Warning::SizeMismatch, None, "declared size differs");

    assert_eq!(
        warnings.contents(),
        "test.il:12,1: Warning ILW0003: declared size differs\n",
    );
}

#[test]
fn quiet_suppresses_messages_but_not_warnings() {
    let (mut report, messages, warnings, _) = report_with_sinks();
    report.quiet = true;

    report.message("assembling...");
    report.warning(Warning::UnknownEscape, None, "unknown escape");

    assert_eq!(messages.contents(), "");
    assert_eq!(warnings.contents(), "Warning ILW0004: unknown escape\n");
}

#[test]
fn messages_reach_their_sink_when_not_quiet() {
    let (mut report, messages, _, _) = report_with_sinks();

    report.message("assembling...");

    assert_eq!(messages.contents(), "assembling...\n");
}

#[test]
fn errors_are_returned_for_propagation() {
    let (mut report, _, _, _) = report_with_sinks();
    report.set_file_path("test.il");

    let err = report.error(
        ErrorKind::InvalidDirective,
        Some(Location { line: 2, column: 5 }),
        "bad argument to .maxstack",
    );

    assert_eq!(
        err,
        AsmError {
            kind: ErrorKind::InvalidDirective,
            location: Some(Location { line: 2, column: 5 }),
            message: "bad argument to .maxstack".into(),
            file_path: "test.il".into(),
        },
    );
    assert_eq!(
        err.to_string(),
        "test.il:2,5: Error ILE0003: bad argument to .maxstack",
    );
}

#[test]
fn printed_errors_land_in_the_error_sink() {
    let (mut report, _, _, errors) = report_with_sinks();
    report.set_file_path("test.il");

    let err = report.error(ErrorKind::Lexical, None, "stray character");
    report.print_error(&err);

    assert_eq!(errors.contents(), "Error ILE0001: stray character\n");
}

#[test]
fn observers_see_every_diagnostic() {
    let (mut report, _, _, _) = report_with_sinks();

    let seen_warnings = Rc::new(RefCell::new(vec![]));
    let sink = Rc::clone(&seen_warnings);
    report.on_warning(move |warning, _, message| {
        sink.borrow_mut().push((warning, message.to_string()));
    });

    let seen_errors = Rc::new(RefCell::new(vec![]));
    let sink = Rc::clone(&seen_errors);
    report.on_error(move |err| sink.borrow_mut().push(err.clone()));

    report.warning(Warning::LayoutIgnored, None, "ignored");
    let _err = report.error(ErrorKind::Unsupported, None, "nope");

    assert_eq!(
        *seen_warnings.borrow(),
        vec![(Warning::LayoutIgnored, "ignored".to_string())],
    );
    assert_eq!(seen_errors.borrow().len(), 1);
    assert_eq!(seen_errors.borrow()[0].kind, ErrorKind::Unsupported);
}

// A warning must never abort: the report stays usable afterwards.
#[test]
fn warnings_do_not_halt_processing() {
    let (mut report, messages, warnings, _) = report_with_sinks();

    report.warning(Warning::LayoutIgnored, None, "first");
    report.warning(Warning::LayoutIgnored, None, "second");
    report.message("done");

    assert_eq!(
        warnings.contents(),
        "Warning ILW0002: first\nWarning ILW0002: second\n",
    );
    assert_eq!(messages.contents(), "done\n");
}
