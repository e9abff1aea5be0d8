//! Terminal interface: the rendering callbacks a compiler prints through.
//!
//! A [`TermIf`] is a set of twelve optional callbacks. A compiler only accepts a complete
//! set: [`TermIf::validate`] turns it into a [`Term`] in which every callback is present, so
//! printing code never meets a missing one.

use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

/// Terminal color; a negative component means "terminal default".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub red: i32,
    pub green: i32,
    pub blue: i32,
}

impl Color {
    pub const DEFAULT: Color = Color { red: -1, green: -1, blue: -1 };
}

impl Default for Color {
    fn default() -> Self {
        Color::DEFAULT
    }
}

pub type FlushFn = Box<dyn FnMut()>;
pub type PutsFn = Box<dyn FnMut(&str)>;
pub type PrintfFn = Box<dyn FnMut(fmt::Arguments<'_>)>;
/// Receives the indentation level and the step, in columns.
pub type IndentFn = Box<dyn FnMut(u32, u32)>;
pub type ClassFn = Box<dyn FnMut(&str)>;
/// Returns false when `name` was not the innermost open class.
pub type EndClassFn = Box<dyn FnMut(&str) -> bool>;
/// Receives the URL and an optional id.
pub type HyperlinkFn = Box<dyn FnMut(&str, Option<&str>)>;
pub type EndHyperlinkFn = Box<dyn FnMut() -> bool>;
pub type GetColorFn = Box<dyn FnMut() -> Color>;
pub type SetColorFn = Box<dyn FnMut(Color)>;

/// Callbacks supplied by the embedding program. All of them are required.
#[derive(Default)]
pub struct TermIf {
    pub flush: Option<FlushFn>,
    pub puts: Option<PutsFn>,
    pub printf: Option<PrintfFn>,
    pub indent: Option<IndentFn>,
    pub class: Option<ClassFn>,
    pub end_class: Option<EndClassFn>,
    pub hyperlink: Option<HyperlinkFn>,
    pub end_hyperlink: Option<EndHyperlinkFn>,
    pub get_color: Option<GetColorFn>,
    pub set_color: Option<SetColorFn>,
    pub get_bgcolor: Option<GetColorFn>,
    pub set_bgcolor: Option<SetColorFn>,
}

/// Names of the callbacks, in validation order.
pub const CALLBACKS: [&str; 12] = [
    "flush",
    "puts",
    "printf",
    "indent",
    "class",
    "end_class",
    "hyperlink",
    "end_hyperlink",
    "get_color",
    "set_color",
    "get_bgcolor",
    "set_bgcolor",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("terminal interface is missing the `{missing}` callback")]
pub struct IncompleteTerm {
    pub missing: &'static str,
}

fn require<T>(slot: Option<T>, name: &'static str) -> Result<T, IncompleteTerm> {
    slot.ok_or(IncompleteTerm { missing: name })
}

impl fmt::Debug for TermIf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present = [
            self.flush.is_some(),
            self.puts.is_some(),
            self.printf.is_some(),
            self.indent.is_some(),
            self.class.is_some(),
            self.end_class.is_some(),
            self.hyperlink.is_some(),
            self.end_hyperlink.is_some(),
            self.get_color.is_some(),
            self.set_color.is_some(),
            self.get_bgcolor.is_some(),
            self.set_bgcolor.is_some(),
        ];
        let missing: Vec<_> = CALLBACKS
            .iter()
            .zip(present)
            .filter(|(_, p)| !p)
            .map(|(n, _)| *n)
            .collect();
        f.debug_struct("TermIf").field("missing", &missing).finish()
    }
}

impl TermIf {
    /// Check that every callback is present.
    pub fn validate(self) -> Result<Term, IncompleteTerm> {
        Ok(Term {
            flush: require(self.flush, "flush")?,
            puts: require(self.puts, "puts")?,
            printf: require(self.printf, "printf")?,
            indent: require(self.indent, "indent")?,
            class: require(self.class, "class")?,
            end_class: require(self.end_class, "end_class")?,
            hyperlink: require(self.hyperlink, "hyperlink")?,
            end_hyperlink: require(self.end_hyperlink, "end_hyperlink")?,
            get_color: require(self.get_color, "get_color")?,
            set_color: require(self.set_color, "set_color")?,
            get_bgcolor: require(self.get_bgcolor, "get_bgcolor")?,
            set_bgcolor: require(self.set_bgcolor, "set_bgcolor")?,
        })
    }

    /// Remove the callback called `name`; unknown names are ignored.
    pub fn without(mut self, name: &str) -> Self {
        match name {
            "flush" => self.flush = None,
            "puts" => self.puts = None,
            "printf" => self.printf = None,
            "indent" => self.indent = None,
            "class" => self.class = None,
            "end_class" => self.end_class = None,
            "hyperlink" => self.hyperlink = None,
            "end_hyperlink" => self.end_hyperlink = None,
            "get_color" => self.get_color = None,
            "set_color" => self.set_color = None,
            "get_bgcolor" => self.get_bgcolor = None,
            "set_bgcolor" => self.set_bgcolor = None,
            _ => {}
        }
        self
    }

    /// Complete interface writing plain text to standard output. Classes and hyperlinks are
    /// not rendered.
    pub fn stdout() -> Self {
        let colors = Rc::new(RefCell::new((Color::DEFAULT, Color::DEFAULT)));
        let (fg_get, fg_set, bg_get, bg_set) =
            (colors.clone(), colors.clone(), colors.clone(), colors);
        TermIf {
            flush: Some(Box::new(|| {
                let _ = std::io::stdout().flush();
            })),
            puts: Some(Box::new(|s: &str| print!("{}", s))),
            printf: Some(Box::new(|args: fmt::Arguments<'_>| print!("{}", args))),
            indent: Some(Box::new(|level: u32, step: u32| {
                print!("\n{:width$}", "", width = (level * step) as usize)
            })),
            class: Some(Box::new(|_: &str| {})),
            end_class: Some(Box::new(|_: &str| true)),
            hyperlink: Some(Box::new(|_: &str, _: Option<&str>| {})),
            end_hyperlink: Some(Box::new(|| true)),
            get_color: Some(Box::new(move || fg_get.borrow().0)),
            set_color: Some(Box::new(move |c: Color| fg_set.borrow_mut().0 = c)),
            get_bgcolor: Some(Box::new(move || bg_get.borrow().1)),
            set_bgcolor: Some(Box::new(move |c: Color| bg_set.borrow_mut().1 = c)),
        }
    }

    /// Complete interface recording everything it is asked to render.
    pub fn capture() -> (Self, Capture) {
        let capture = Capture::default();
        let c = || capture.state.clone();
        let (flush, puts, printf, indent, class, end_class) = (c(), c(), c(), c(), c(), c());
        let (hyperlink, get_color, set_color, get_bg, set_bg) = (c(), c(), c(), c(), c());
        let term = TermIf {
            flush: Some(Box::new(move || flush.borrow_mut().flushes += 1)),
            puts: Some(Box::new(move |s: &str| puts.borrow_mut().text.push_str(s))),
            printf: Some(Box::new(move |args: fmt::Arguments<'_>| {
                use std::fmt::Write as _;
                let _ = printf.borrow_mut().text.write_fmt(args);
            })),
            indent: Some(Box::new(move |level: u32, step: u32| {
                let mut st = indent.borrow_mut();
                st.text.push('\n');
                st.text.extend(std::iter::repeat(' ').take((level * step) as usize));
            })),
            class: Some(Box::new(move |name: &str| class.borrow_mut().open_classes.push(name.to_string()))),
            end_class: Some(Box::new(move |name: &str| {
                let mut st = end_class.borrow_mut();
                let innermost = st.open_classes.last().is_some_and(|open| open == name);
                if innermost {
                    st.open_classes.pop();
                    st.classes.push(name.to_string());
                }
                innermost
            })),
            hyperlink: Some(Box::new(move |url: &str, _id: Option<&str>| {
                hyperlink.borrow_mut().links.push(url.to_string())
            })),
            end_hyperlink: Some(Box::new(|| true)),
            get_color: Some(Box::new(move || get_color.borrow().fg)),
            set_color: Some(Box::new(move |col: Color| set_color.borrow_mut().fg = col)),
            get_bgcolor: Some(Box::new(move || get_bg.borrow().bg)),
            set_bgcolor: Some(Box::new(move |col: Color| set_bg.borrow_mut().bg = col)),
        };
        (term, capture)
    }
}

#[derive(Debug, Default)]
pub struct CaptureState {
    pub text: String,
    /// Classes in the order they were closed.
    pub classes: Vec<String>,
    pub open_classes: Vec<String>,
    pub links: Vec<String>,
    pub flushes: usize,
    pub fg: Color,
    pub bg: Color,
}

/// Shared view of what a [`TermIf::capture`] interface rendered.
#[derive(Debug, Default, Clone)]
pub struct Capture {
    state: Rc<RefCell<CaptureState>>,
}

impl Capture {
    pub fn text(&self) -> String {
        self.state.borrow().text.clone()
    }

    pub fn classes(&self) -> Vec<String> {
        self.state.borrow().classes.clone()
    }

    pub fn flushes(&self) -> usize {
        self.state.borrow().flushes
    }

    pub fn clear(&self) {
        self.state.borrow_mut().text.clear();
        self.state.borrow_mut().classes.clear();
    }
}

/// A validated terminal interface.
pub struct Term {
    flush: FlushFn,
    puts: PutsFn,
    printf: PrintfFn,
    indent: IndentFn,
    class: ClassFn,
    end_class: EndClassFn,
    hyperlink: HyperlinkFn,
    end_hyperlink: EndHyperlinkFn,
    get_color: GetColorFn,
    set_color: SetColorFn,
    get_bgcolor: GetColorFn,
    set_bgcolor: SetColorFn,
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Term").finish_non_exhaustive()
    }
}

impl Term {
    pub fn flush(&mut self) {
        (self.flush)()
    }

    pub fn puts(&mut self, s: &str) {
        (self.puts)(s)
    }

    pub fn printf(&mut self, args: fmt::Arguments<'_>) {
        (self.printf)(args)
    }

    pub fn indent(&mut self, level: u32, step: u32) {
        (self.indent)(level, step)
    }

    pub fn class(&mut self, name: &str) {
        (self.class)(name)
    }

    pub fn end_class(&mut self, name: &str) -> bool {
        (self.end_class)(name)
    }

    pub fn hyperlink(&mut self, url: &str, id: Option<&str>) {
        (self.hyperlink)(url, id)
    }

    pub fn end_hyperlink(&mut self) -> bool {
        (self.end_hyperlink)()
    }

    pub fn color(&mut self) -> Color {
        (self.get_color)()
    }

    pub fn set_color(&mut self, color: Color) {
        (self.set_color)(color)
    }

    pub fn bgcolor(&mut self) -> Color {
        (self.get_bgcolor)()
    }

    pub fn set_bgcolor(&mut self, color: Color) {
        (self.set_bgcolor)(color)
    }

    /// Write `text` wrapped in the `name` class.
    pub fn styled(&mut self, name: &str, text: &str) {
        self.class(name);
        self.puts(text);
        self.end_class(name);
    }
}
