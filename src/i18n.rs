use crate::auth::Lang;

const PT_LABELS: &[(&str, &str)] = &[
    ("title", "Sistema Ares"),
    ("login", "Entrar"),
    ("email", "E-mail"),
    ("password", "Senha"),
    ("studentLogin", "Login Aluno"),
    ("adminPanel", "Painel Administrador"),
    ("registerStudent", "Cadastrar Aluno"),
    ("registerTeacher", "Cadastrar Professor"),
    ("fullName", "Nome completo"),
    ("motherName", "Nome da mãe"),
    ("fatherName", "Nome do pai"),
    ("age", "Idade"),
    ("grade", "Série"),
    ("register", "Cadastrar"),
    ("subject", "Disciplina"),
    ("classes", "Turmas"),
];

const EN_LABELS: &[(&str, &str)] = &[
    ("title", "Ares System"),
    ("login", "Login"),
    ("email", "Email"),
    ("password", "Password"),
    ("studentLogin", "Student Login"),
    ("adminPanel", "Admin Panel"),
    ("registerStudent", "Register Student"),
    ("registerTeacher", "Register Teacher"),
    ("fullName", "Full name"),
    ("motherName", "Mother's name"),
    ("fatherName", "Father's name"),
    ("age", "Age"),
    ("grade", "Class"),
    ("register", "Register"),
    ("subject", "Subject"),
    ("classes", "Classes"),
];

pub fn labels(lang: Lang) -> serde_json::Value {
    let table = match lang {
        Lang::Pt => PT_LABELS,
        Lang::En => EN_LABELS,
    };
    let map: serde_json::Map<String, serde_json::Value> = table
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
        .collect();
    serde_json::Value::Object(map)
}

pub fn score_update_title(lang: Lang) -> &'static str {
    match lang {
        Lang::Pt => "Atualização de Pontuação",
        Lang::En => "Score Update",
    }
}

pub fn score_update_message(lang: Lang, total: f64, new_rank: Option<&str>) -> String {
    match (lang, new_rank) {
        (Lang::Pt, Some(rank)) => format!(
            "Sua pontuação total é {}. Você atingiu 70% e foi promovido para {}.",
            total, rank
        ),
        (Lang::Pt, None) => format!(
            "Sua pontuação total é {}. Você ainda não alcançou 70% para promoção.",
            total
        ),
        (Lang::En, Some(rank)) => format!(
            "Your total score is {}. You reached 70% and were promoted to {}.",
            total, rank
        ),
        (Lang::En, None) => format!(
            "Your total score is {}. You have not reached 70% for promotion yet.",
            total
        ),
    }
}
