//! Spanish word lists used by the heuristic phases.
//!
//! Every entry is lowercase with vowel accents folded (ñ is kept), matching
//! the normalization the cleaning phase applies to `TextoLimpio`. Keep new
//! entries in that form or they will never match.

/// Polarity lexicon, tourism vocabulary included.
pub const POSITIVE_WORDS: &[&str] = &[
    "excelente",
    "excelentes",
    "bueno",
    "buena",
    "buenos",
    "buenas",
    "bonito",
    "bonita",
    "hermoso",
    "hermosa",
    "precioso",
    "preciosa",
    "lindo",
    "linda",
    "increible",
    "espectacular",
    "maravilloso",
    "maravillosa",
    "maravilla",
    "perfecto",
    "perfecta",
    "genial",
    "fantastico",
    "fantastica",
    "delicioso",
    "deliciosa",
    "rico",
    "rica",
    "sabroso",
    "sabrosa",
    "fresco",
    "fresca",
    "agradable",
    "acogedor",
    "acogedora",
    "limpio",
    "limpia",
    "impecable",
    "amable",
    "amables",
    "atento",
    "atenta",
    "atentos",
    "rapido",
    "rapida",
    "recomendable",
    "recomendado",
    "recomiendo",
    "barato",
    "barata",
    "economico",
    "economica",
    "comodo",
    "comoda",
    "tranquilo",
    "tranquila",
    "seguro",
    "segura",
    "impresionante",
    "magnifico",
    "magnifica",
    "encantador",
    "encantadora",
    "encanto",
    "encanta",
    "estupendo",
    "estupenda",
    "feliz",
    "disfrutamos",
    "disfrute",
    "gusto",
    "ideal",
    "unico",
    "unica",
    "mejor",
    "volveria",
    "volveremos",
    "vale",
    "espectaculares",
    "paradisiaco",
    "paradisiaca",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "malo",
    "mala",
    "malos",
    "malas",
    "mal",
    "pesimo",
    "pesima",
    "terrible",
    "horrible",
    "horroroso",
    "feo",
    "fea",
    "sucio",
    "sucia",
    "sucios",
    "sucias",
    "suciedad",
    "caro",
    "cara",
    "caros",
    "caras",
    "carisimo",
    "costoso",
    "costosa",
    "lento",
    "lenta",
    "grosero",
    "grosera",
    "groseros",
    "descortes",
    "desagradable",
    "decepcion",
    "decepcionante",
    "decepcionado",
    "decepcionada",
    "incomodo",
    "incomoda",
    "ruidoso",
    "ruidosa",
    "ruido",
    "peligroso",
    "peligrosa",
    "inseguro",
    "insegura",
    "estafa",
    "robo",
    "fraude",
    "engaño",
    "mediocre",
    "deficiente",
    "pobre",
    "peor",
    "evitar",
    "eviten",
    "queja",
    "quejas",
    "problema",
    "problemas",
    "demora",
    "demorado",
    "frio",
    "fria",
    "desastre",
    "desorganizado",
    "abandonado",
    "abandonada",
    "deteriorado",
    "deteriorada",
    "roto",
    "rota",
    "fatal",
    "asqueroso",
    "asquerosa",
    "insalubre",
    "olores",
    "cucarachas",
];

/// A negation token flips the polarity of the word right after it.
pub const NEGATION_WORDS: &[&str] = &["no", "nunca", "jamas", "sin", "tampoco", "ni"];

/// First-person and evaluative markers; polar words also count as
/// subjective evidence, so this list only carries what the polarity
/// lexicon does not.
pub const SUBJECTIVE_MARKERS: &[&str] = &[
    "creo",
    "pienso",
    "opino",
    "siento",
    "considero",
    "parece",
    "parecio",
    "me",
    "mi",
    "nos",
    "nuestra",
    "nuestro",
    "recomendaria",
    "amo",
    "ame",
    "odio",
    "odie",
    "prefiero",
    "preferi",
    "gusta",
    "gustaria",
    "sorprendio",
    "sorprendente",
    "definitivamente",
    "realmente",
    "verdaderamente",
    "totalmente",
    "absolutamente",
    "sinceramente",
    "honestamente",
    "personalmente",
    "quiza",
    "quizas",
    "seguramente",
    "probablemente",
    "espero",
    "esperaba",
    "imperdible",
    "inolvidable",
];

pub const STOPWORDS: &[&str] = &[
    "a", "al", "algo", "alguna", "algunas", "alguno", "algunos", "ante", "antes", "aunque",
    "cada", "como", "con", "contra", "cual", "cuando", "de", "del", "desde", "donde", "durante",
    "e", "el", "ella", "ellas", "ellos", "en", "entre", "era", "eran", "es", "esa", "esas",
    "ese", "eso", "esos", "esta", "estaba", "estaban", "estamos", "estan", "estar", "este",
    "esto", "estos", "fue", "fueron", "ha", "habia", "han", "hasta", "hay", "la", "las", "le",
    "les", "lo", "los", "mas", "me", "mi", "mientras", "mucho", "muy", "nada", "ni", "no",
    "nos", "nosotros", "nuestra", "nuestro", "o", "os", "otra", "otras", "otro", "otros",
    "para", "pero", "poco", "por", "porque", "que", "quien", "se", "sea", "segun", "ser", "si",
    "siempre", "sin", "sobre", "son", "soy", "su", "sus", "tambien", "tanto", "te", "tiene",
    "tienen", "todo", "todos", "tras", "tu", "tus", "un", "una", "unas", "unos", "y", "ya",
    "yo",
];

/// Category vocabulary in the fixed label order the `Categorias` column
/// uses. Labels are part of the data contract.
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Alojamiento",
        &[
            "hotel", "hostal", "habitacion", "habitaciones", "cama", "camas", "alojamiento",
            "hospedaje", "cabaña", "cabañas", "suite", "recepcion", "resort", "posada",
            "ducha", "aire", "acondicionado",
        ],
    ),
    (
        "Gastronomia",
        &[
            "comida", "restaurante", "restaurantes", "plato", "platos", "desayuno", "almuerzo",
            "cena", "menu", "gastronomia", "sabor", "cocina", "comer", "pescado", "mariscos",
            "bebida", "bebidas", "cafe", "postre",
        ],
    ),
    (
        "Atencion",
        &[
            "atencion", "servicio", "personal", "staff", "mesero", "meseros", "camarero",
            "guia", "guias", "recepcionista", "trato", "atendieron", "atendio",
        ],
    ),
    (
        "Precio",
        &[
            "precio", "precios", "caro", "cara", "barato", "barata", "costo", "costos",
            "pagar", "pago", "economico", "economica", "tarifa", "tarifas", "dinero", "cobran",
        ],
    ),
    (
        "Ubicacion",
        &[
            "ubicacion", "ubicado", "ubicada", "zona", "centro", "centrico", "centrica",
            "cerca", "lejos", "acceso", "llegar", "transporte", "distancia",
        ],
    ),
    (
        "Limpieza",
        &[
            "limpio", "limpia", "limpieza", "sucio", "sucia", "suciedad", "aseo", "higiene",
            "baño", "baños", "impecable", "desaseado",
        ],
    ),
    (
        "Actividades",
        &[
            "tour", "tours", "excursion", "excursiones", "paseo", "paseos", "playa", "playas",
            "actividad", "actividades", "snorkel", "buceo", "caminata", "visita", "visitas",
            "parque", "museo", "senderismo",
        ],
    ),
];

/// Label used when no category keyword matches a review.
pub const DEFAULT_CATEGORY: &str = "General";
