#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Starter {
    pub(crate) label: &'static str,
    pub(crate) message: &'static str,
}

pub(crate) const STARTERS: [Starter; 4] = [
    Starter {
        label: "Véletlenszerű közmondás",
        message: "Adj nekem 5 db véletlenszerű közmondást, magyarázattal",
    },
    Starter {
        label: "Magyarázz el egy közmondást",
        message: "Magyarázd el nekem a közmondást.",
    },
    Starter {
        label: "Játék: hiányzó szó kitalálása",
        message: "Hiányzó szó kitalálós játék",
    },
    Starter {
        label: "Játék: közmondás jelentésének kitalálása",
        message: "Közmondás jelentésének kitalálós játék",
    },
];
